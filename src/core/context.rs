//! Evaluation request context
//!
//! A `PermissionContext` describes one requested operation. It is built by
//! the caller, passed to the engine by reference, and never mutated by
//! evaluation; the only place the engine retains it is inside an audit
//! entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::types::{OperationKind, ResourceScope};

/// Immutable input to a permission evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionContext {
    /// Resource identifier (file path or URI)
    pub uri: String,

    /// Operation the tool wants to perform
    pub operation: OperationKind,

    /// Granularity of the request
    pub scope: ResourceScope,

    /// Identifier of the tool making the request (e.g. "file_editor")
    pub requesting_tool: String,

    /// When the request was made
    pub timestamp: DateTime<Utc>,

    /// Optional user the request is attributed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Free-form metadata supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,

    /// Number of resources in the batch this request belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl PermissionContext {
    /// Create a new context stamped with the current wall clock
    pub fn new(
        uri: impl Into<String>,
        operation: OperationKind,
        scope: ResourceScope,
        requesting_tool: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            operation,
            scope,
            requesting_tool: requesting_tool.into(),
            timestamp: Utc::now(),
            user_id: None,
            metadata: None,
            batch_size: None,
        }
    }

    /// Set the request timestamp explicitly
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attribute the request to a user
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a metadata value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Mark the request as part of a batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Composite key used by the decision cache
    pub fn cache_key(&self) -> String {
        format!("{}|{}|{}", self.operation, self.uri, self.requesting_tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = PermissionContext::new(
            "/workspace/src/main.rs",
            OperationKind::Read,
            ResourceScope::File,
            "file_reader",
        )
        .with_user_id("alice")
        .with_metadata("origin", "chat")
        .with_batch_size(3);

        assert_eq!(ctx.uri, "/workspace/src/main.rs");
        assert_eq!(ctx.operation, OperationKind::Read);
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert_eq!(ctx.batch_size, Some(3));
        assert_eq!(
            ctx.metadata.as_ref().and_then(|m| m.get("origin")).and_then(|v| v.as_str()),
            Some("chat")
        );
    }

    #[test]
    fn test_cache_key() {
        let ctx = PermissionContext::new(
            "/a.txt",
            OperationKind::Write,
            ResourceScope::File,
            "editor",
        );
        assert_eq!(ctx.cache_key(), "write|/a.txt|editor");
    }

    #[test]
    fn test_context_serde_roundtrip() {
        let ctx = PermissionContext::new(
            "/a.txt",
            OperationKind::Read,
            ResourceScope::File,
            "reader",
        );
        let json = serde_json::to_string(&ctx).unwrap();
        let back: PermissionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.uri, ctx.uri);
        assert_eq!(back.operation, ctx.operation);
        assert_eq!(back.requesting_tool, ctx.requesting_tool);
    }
}
