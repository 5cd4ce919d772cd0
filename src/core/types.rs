//! Core vocabularies for the permission engine
//!
//! Closed string sets from the wire format become exhaustive enums so the
//! matcher and condition evaluators can match on them without catch-alls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of operation an agent wants to perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
    Execute,
    Delete,
    Create,
    Analyze,
    Edit,
    Search,
}

impl OperationKind {
    /// All operation kinds, in declaration order
    pub fn all() -> [OperationKind; 8] {
        [
            OperationKind::Read,
            OperationKind::Write,
            OperationKind::Execute,
            OperationKind::Delete,
            OperationKind::Create,
            OperationKind::Analyze,
            OperationKind::Edit,
            OperationKind::Search,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Execute => "execute",
            OperationKind::Delete => "delete",
            OperationKind::Create => "create",
            OperationKind::Analyze => "analyze",
            OperationKind::Edit => "edit",
            OperationKind::Search => "search",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resource granularity a rule or context applies to
///
/// Scopes form a hierarchy: a rule at a wider scope covers requests at any
/// narrower scope, but not the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    File,
    Directory,
    Workspace,
    System,
}

impl ResourceScope {
    /// Check whether a rule at this scope covers a request at `other`
    ///
    /// System covers everything; Workspace covers workspace, directory and
    /// file requests; Directory covers directory and file requests; File
    /// covers only file requests.
    pub fn covers(self, other: ResourceScope) -> bool {
        match self {
            ResourceScope::System => true,
            ResourceScope::Workspace => !matches!(other, ResourceScope::System),
            ResourceScope::Directory => {
                matches!(other, ResourceScope::Directory | ResourceScope::File)
            }
            ResourceScope::File => other == ResourceScope::File,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceScope::File => "file",
            ResourceScope::Directory => "directory",
            ResourceScope::Workspace => "workspace",
            ResourceScope::System => "system",
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a permission evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    /// Auto-approve the operation
    Allow,
    /// Auto-deny the operation
    Deny,
    /// Escalate to the user
    Prompt,
}

impl PermissionDecision {
    /// Prompt decisions must never be reused without asking the user again
    pub fn is_cacheable(self) -> bool {
        !matches!(self, PermissionDecision::Prompt)
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionDecision::Allow => write!(f, "allow"),
            PermissionDecision::Deny => write!(f, "deny"),
            PermissionDecision::Prompt => write!(f, "prompt"),
        }
    }
}

/// Risk level attached to a rule or decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only operations, no side effects
    Low,
    /// Local modifications, reversible
    Medium,
    /// Significant changes
    High,
    /// System modifications, irreversible operations
    Critical,
}

impl RiskLevel {
    /// Human-readable description for prompts and exports
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low risk - safe, read-only operation",
            RiskLevel::Medium => "Medium risk - local changes, reversible",
            RiskLevel::High => "High risk - significant changes",
            RiskLevel::Critical => "Critical risk - irreversible or system-wide",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Security posture of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Conservative,
    Balanced,
    Permissive,
    Custom,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityLevel::Conservative => write!(f, "conservative"),
            SecurityLevel::Balanced => write!(f, "balanced"),
            SecurityLevel::Permissive => write!(f, "permissive"),
            SecurityLevel::Custom => write!(f, "custom"),
        }
    }
}
