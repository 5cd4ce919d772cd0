//! Audit log
//!
//! Append-only ring buffer of every decision the engine makes. When the
//! capacity is exceeded the oldest entries are dropped first, both on
//! append and when persisted state is loaded.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::core::context::PermissionContext;
use crate::core::types::{OperationKind, PermissionDecision, RiskLevel};
use crate::rules::{ActivitySource, PermissionResult};

/// Immutable record of one evaluated or manually-decided request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionAuditEntry {
    pub id: String,
    pub context: PermissionContext,
    pub result: PermissionResult,

    /// Whether the caller actually performed the operation
    pub executed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl PermissionAuditEntry {
    pub fn new(
        id: impl Into<String>,
        context: PermissionContext,
        result: PermissionResult,
        executed: bool,
    ) -> Self {
        Self {
            id: id.into(),
            context,
            result,
            executed,
            notes: None,
            session_id: None,
            ip_address: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Exact-equality filter over audit entries; every present field must match
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub decision: Option<PermissionDecision>,
    pub operation: Option<OperationKind>,
    pub risk_level: Option<RiskLevel>,
    pub requesting_tool: Option<String>,
    pub uri: Option<String>,
    pub user_id: Option<String>,
    pub executed: Option<bool>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision(mut self, decision: PermissionDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn requesting_tool(mut self, tool: impl Into<String>) -> Self {
        self.requesting_tool = Some(tool.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn executed(mut self, executed: bool) -> Self {
        self.executed = Some(executed);
        self
    }

    fn matches(&self, entry: &PermissionAuditEntry) -> bool {
        if let Some(decision) = self.decision {
            if entry.result.decision != decision {
                return false;
            }
        }
        if let Some(operation) = self.operation {
            if entry.context.operation != operation {
                return false;
            }
        }
        if let Some(risk_level) = self.risk_level {
            if entry.result.risk_level != risk_level {
                return false;
            }
        }
        if let Some(ref tool) = self.requesting_tool {
            if entry.context.requesting_tool != *tool {
                return false;
            }
        }
        if let Some(ref uri) = self.uri {
            if entry.context.uri != *uri {
                return false;
            }
        }
        if let Some(ref user_id) = self.user_id {
            if entry.context.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(executed) = self.executed {
            if entry.executed != executed {
                return false;
            }
        }
        true
    }
}

struct AuditInner {
    entries: VecDeque<PermissionAuditEntry>,
    capacity: usize,
}

/// Capacity-bounded audit trail
pub struct AuditLog {
    inner: RwLock<AuditInner>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(AuditInner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            }),
        }
    }

    /// Append an entry, dropping the oldest if the cap is exceeded
    pub async fn append(&self, entry: PermissionAuditEntry) {
        let mut inner = self.inner.write().await;
        inner.entries.push_back(entry);
        while inner.entries.len() > inner.capacity {
            inner.entries.pop_front();
        }
    }

    /// Entries matching the filter, newest first, truncated to `limit`
    pub async fn query(
        &self,
        limit: Option<usize>,
        filter: &AuditFilter,
    ) -> Vec<PermissionAuditEntry> {
        let inner = self.inner.read().await;
        let mut matched: Vec<PermissionAuditEntry> = inner
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.context.timestamp.cmp(&a.context.timestamp));
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Remove all entries, or only those older than the cutoff; returns how
    /// many were removed
    pub async fn clear(&self, older_than: Option<DateTime<Utc>>) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        match older_than {
            Some(cutoff) => inner.entries.retain(|e| e.context.timestamp >= cutoff),
            None => inner.entries.clear(),
        }
        before - inner.entries.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// All entries in insertion order (oldest first)
    pub async fn snapshot(&self) -> Vec<PermissionAuditEntry> {
        self.inner.read().await.entries.iter().cloned().collect()
    }

    /// Replace the contents from persisted state, keeping only the tail
    /// that fits the cap
    pub async fn restore(&self, entries: Vec<PermissionAuditEntry>) {
        let mut inner = self.inner.write().await;
        let skip = entries.len().saturating_sub(inner.capacity);
        inner.entries = entries.into_iter().skip(skip).collect();
    }

    /// Change the cap, dropping oldest entries if it shrank
    pub async fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.write().await;
        inner.capacity = capacity;
        while inner.entries.len() > capacity {
            inner.entries.pop_front();
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").finish_non_exhaustive()
    }
}

#[async_trait]
impl ActivitySource for AuditLog {
    async fn has_recent_activity(
        &self,
        uri: &str,
        operation: OperationKind,
        within_minutes: f64,
        now: DateTime<Utc>,
    ) -> bool {
        let cutoff = now - Duration::milliseconds((within_minutes * 60_000.0) as i64);
        let inner = self.inner.read().await;
        inner.entries.iter().any(|entry| {
            entry.context.uri == uri
                && entry.context.operation == operation
                && entry.context.timestamp >= cutoff
        })
    }
}
