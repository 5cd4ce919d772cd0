//! Permission profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::{PermissionDecision, SecurityLevel};
use crate::rules::PermissionRule;

/// A named, versioned bundle of rules plus a default decision
///
/// Profiles are owned exclusively by the `ProfileStore`; `version` is
/// bumped on every mutation. Built-in profiles keep their rule set frozen
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionProfile {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Factory-provided profile whose rule set is immutable
    pub is_built_in: bool,

    /// Whether this profile is the one evaluations resolve to
    pub is_active: bool,

    /// Marked as the fallback profile in configuration UIs
    pub is_default: bool,

    /// Ordered rule list; order breaks priority ties
    pub rules: Vec<PermissionRule>,

    /// Decision used when no rule matches
    pub default_decision: PermissionDecision,

    pub security_level: SecurityLevel,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    /// Monotonically incremented on every mutation
    pub version: u64,
}

impl PermissionProfile {
    pub fn rule(&self, rule_id: &str) -> Option<&PermissionRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }
}

impl fmt::Display for PermissionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} rules, default {})",
            self.name,
            self.security_level,
            self.rules.len(),
            self.default_decision
        )
    }
}

/// Input for creating a profile; the store assigns id, timestamps and
/// version
#[derive(Debug, Clone)]
pub struct ProfileDraft {
    pub name: String,
    pub description: String,
    pub is_built_in: bool,
    pub is_default: bool,
    pub rules: Vec<PermissionRule>,
    pub default_decision: PermissionDecision,
    pub security_level: SecurityLevel,
}

impl ProfileDraft {
    /// Draft for a user-defined profile
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            is_built_in: false,
            is_default: false,
            rules: Vec::new(),
            default_decision: PermissionDecision::Prompt,
            security_level: SecurityLevel::Custom,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rules(mut self, rules: Vec<PermissionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_default_decision(mut self, decision: PermissionDecision) -> Self {
        self.default_decision = decision;
        self
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub(crate) fn built_in(mut self) -> Self {
        self.is_built_in = true;
        self
    }
}

/// Partial update applied by `ProfileStore::update_profile`
///
/// Absent fields are left unchanged. A `rules` replacement against a
/// built-in profile is rejected.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<Vec<PermissionRule>>,
    pub default_decision: Option<PermissionDecision>,
    pub security_level: Option<SecurityLevel>,
    pub is_default: Option<bool>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn rules(mut self, rules: Vec<PermissionRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn default_decision(mut self, decision: PermissionDecision) -> Self {
        self.default_decision = Some(decision);
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    pub fn default_flag(mut self, is_default: bool) -> Self {
        self.is_default = Some(is_default);
        self
    }

    /// Whether this update touches the rule set
    pub fn touches_rules(&self) -> bool {
        self.rules.is_some()
    }
}
