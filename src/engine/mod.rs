//! Evaluation orchestrator
//!
//! The `PermissionEngine` is the façade hosts construct once with their
//! injected collaborators (persistence, clock, id generator, filesystem
//! and workspace probes) and pass by reference to all call sites.
//! Lifecycle is explicit: `PermissionEngine::builder().build().await`
//! to construct, `dispose()` to stop background work and flush state.

pub mod config;
pub mod engine;
pub mod state;

pub use config::EngineConfig;
pub use engine::{EvaluationOptions, PermissionEngine, PermissionEngineBuilder, RememberDecision};
pub use state::{PersistedState, STATE_KEY};
