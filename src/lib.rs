//! Gatekeeper - permission policy engine for AI coding agents
//!
//! Decides whether a requested file operation should be auto-approved,
//! auto-denied, or escalated to the user, based on prioritized rules
//! grouped into named profiles. Ships with a decision cache, an audit
//! trail with export and statistics, and a miner that suggests new rules
//! from historical decisions.
//!
//! ```ignore
//! use gatekeeper::core::{OperationKind, PermissionContext, ResourceScope};
//! use gatekeeper::engine::{EvaluationOptions, PermissionEngine};
//!
//! let engine = PermissionEngine::builder().build().await?;
//!
//! let context = PermissionContext::new(
//!     "/workspace/notes.md",
//!     OperationKind::Read,
//!     ResourceScope::File,
//!     "file_reader",
//! );
//! let result = engine
//!     .evaluate_permission(&context, &EvaluationOptions::new())
//!     .await;
//!
//! if result.is_allowed() {
//!     // perform the operation; enforcement stays with the caller
//! }
//! ```

pub mod core;
pub mod rules;

// Stores and trails
pub mod audit;
pub mod cache;
pub mod profiles;
pub mod storage;

// Host integration
pub mod events;
pub mod logging;

// The façade
pub mod engine;
