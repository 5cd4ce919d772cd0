//! Audit trail
//!
//! Every decision the engine makes lands here: a capacity-bounded,
//! append-only log with filtered queries, JSON/CSV export, aggregate
//! statistics, and a miner that proposes rules from consistent history.

pub mod export;
pub mod log;
pub mod stats;
pub mod suggest;

pub use export::{export_entries, ExportFormat};
pub use log::{AuditFilter, AuditLog, PermissionAuditEntry};
pub use stats::{compute_statistics, PermissionStatistics, RuleMatchCount, TimeRange};
pub use suggest::suggested_rules;
