//! Core types for the permission engine
//!
//! This module provides the fundamental types used throughout the engine:
//! - `PermissionContext` - immutable input to an evaluation
//! - `OperationKind` / `ResourceScope` / `PermissionDecision` / `RiskLevel` -
//!   the closed vocabularies every component matches on
//! - `EngineError` - error types

pub mod clock;
pub mod context;
pub mod error;
pub mod ids;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::PermissionContext;
pub use error::{EngineError, EngineResult};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use types::{OperationKind, PermissionDecision, ResourceScope, RiskLevel, SecurityLevel};
