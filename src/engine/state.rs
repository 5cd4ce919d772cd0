//! Persisted engine state

use serde::{Deserialize, Serialize};

use crate::audit::PermissionAuditEntry;
use crate::profiles::PermissionProfile;

use super::config::EngineConfig;

/// The single blob the engine stores in its key-value collaborator
///
/// Profiles are stored as id/profile pairs to keep the layout stable even
/// if the in-memory container changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub profiles: Vec<(String, PermissionProfile)>,
    pub active_profile_id: Option<String>,
    /// Audit tail, already capped to the configured maximum
    pub audit_log: Vec<PermissionAuditEntry>,
    pub configuration: EngineConfig,
}

/// Key the engine state blob is stored under
pub const STATE_KEY: &str = "gatekeeper.state";
