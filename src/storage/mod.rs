//! Persistence collaborators
//!
//! The engine only needs a get/update key-value surface that holds JSON.
//! `MemoryStore` keeps state for the process lifetime; `JsonFileStore`
//! persists it across restarts.

pub mod file;
pub mod kv;

pub use file::JsonFileStore;
pub use kv::{KeyValueStore, MemoryStore};
