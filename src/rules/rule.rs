//! Permission rule and condition definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::core::types::{OperationKind, PermissionDecision, ResourceScope, RiskLevel};

fn default_true() -> bool {
    true
}

/// What a condition tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// The resource's file extension
    FileExtension,
    /// A pattern over the resource path
    FilePattern,
    /// The raw resource path
    FilePath,
    /// The resource's size on disk (requires a filesystem probe)
    FileSize,
    /// Whether the resource lies under a workspace root (requires a probe)
    WorkspaceRoot,
    /// The wall-clock hour at evaluation time
    TimeOfDay,
    /// Prior audit-log activity on the same resource and operation
    RecentActivity,
}

/// How a condition compares its value against the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    LessThan,
    GreaterThan,
    Between,
}

/// Condition value: a scalar or a list of strings/numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Str(String),
    Num(f64),
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// View the value as a flat list of scalar items
    ///
    /// A scalar yields itself; a list yields its elements. Nested lists are
    /// not flattened further.
    pub fn items(&self) -> Vec<&ConditionValue> {
        match self {
            ConditionValue::List(items) => items.iter().collect(),
            scalar => vec![scalar],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConditionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            ConditionValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// First numeric item, scanning a list left to right
    pub fn first_num(&self) -> Option<f64> {
        self.items().iter().find_map(|v| v.as_num())
    }

    /// All numeric items in order
    pub fn nums(&self) -> Vec<f64> {
        self.items().iter().filter_map(|v| v.as_num()).collect()
    }

    /// True for the empty string or an empty list
    pub fn is_empty(&self) -> bool {
        match self {
            ConditionValue::Str(s) => s.is_empty(),
            ConditionValue::Num(_) => false,
            ConditionValue::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::Str(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::Str(s)
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Num(n)
    }
}

impl From<u64> for ConditionValue {
    fn from(n: u64) -> Self {
        ConditionValue::Num(n as f64)
    }
}

impl<T: Into<ConditionValue>> From<Vec<T>> for ConditionValue {
    fn from(items: Vec<T>) -> Self {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// An atomic predicate attached to a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// What this condition tests
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Comparison operator
    pub operator: ConditionOperator,

    /// Value(s) to compare against
    pub value: ConditionValue,

    /// Flip the boolean result before it contributes to the rule's AND
    #[serde(default)]
    pub negate: bool,

    /// Optional free-form annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl RuleCondition {
    /// Create a new condition
    pub fn new(
        condition_type: ConditionType,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            condition_type,
            operator,
            value: value.into(),
            negate: false,
            metadata: None,
        }
    }

    /// Flip the condition's result
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Condition matching any of the given file extensions
    pub fn extension_in<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<ConditionValue> = extensions
            .into_iter()
            .map(|e| ConditionValue::Str(e.into()))
            .collect();
        Self::new(
            ConditionType::FileExtension,
            ConditionOperator::Equals,
            ConditionValue::List(values),
        )
    }

    /// Condition matching one exact path
    pub fn path_equals(path: impl Into<String>) -> Self {
        Self::new(
            ConditionType::FilePath,
            ConditionOperator::Equals,
            ConditionValue::Str(path.into()),
        )
    }

    /// Condition matching paths against a regular expression
    pub fn path_matches(pattern: impl Into<String>) -> Self {
        Self::new(
            ConditionType::FilePattern,
            ConditionOperator::Matches,
            ConditionValue::Str(pattern.into()),
        )
    }
}

/// A prioritized, conditionally-matched policy statement
///
/// Rules live inside a profile and have no independent lifecycle; they are
/// created, updated and deleted only through the owning `ProfileStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Operation this rule applies to (exact match, no wildcard)
    pub operation: OperationKind,

    /// Widest request scope this rule covers
    pub scope: ResourceScope,

    /// Decision produced when the rule matches
    pub decision: PermissionDecision,

    /// Severity attached to the decision
    pub risk_level: RiskLevel,

    /// Conditions ANDed together; an empty list matches every context the
    /// scope and operation cover (a blanket rule)
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,

    /// Evaluation priority, expected range 0-1000; higher is evaluated first
    pub priority: u32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether matches of this rule must always be audited
    #[serde(default)]
    pub audit_required: bool,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl PermissionRule {
    /// Create a new rule with a generated id and default settings
    pub fn new(
        name: impl Into<String>,
        operation: OperationKind,
        scope: ResourceScope,
        decision: PermissionDecision,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            operation,
            scope,
            decision,
            risk_level: RiskLevel::default(),
            conditions: Vec::new(),
            priority: 0,
            enabled: true,
            audit_required: false,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_audit_required(mut self, audit_required: bool) -> Self {
        self.audit_required = audit_required;
        self
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {} -> {}, priority {})",
            self.name, self.operation, self.scope, self.decision, self.priority
        )
    }
}

/// Outcome of rule validation
///
/// Validation failures are reported, not thrown; structural CRUD errors are
/// the only ones that bubble as `EngineError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Highest priority accepted by validation
pub const MAX_RULE_PRIORITY: u32 = 1000;

/// Validate a rule before it is handed to the profile store
///
/// Checks: non-empty name and description, priority within range, at least
/// one condition, and a usable value on every condition. The matcher itself
/// trusts validation and does not re-check; see `rules::matcher` for the
/// blanket-rule consequence of bypassing this gate.
pub fn validate_rule(rule: &PermissionRule) -> RuleValidation {
    let mut errors = Vec::new();

    if rule.name.trim().is_empty() {
        errors.push("Rule name is required".to_string());
    }
    if rule.description.trim().is_empty() {
        errors.push("Rule description is required".to_string());
    }
    if rule.priority > MAX_RULE_PRIORITY {
        errors.push(format!(
            "Rule priority must be between 0 and {MAX_RULE_PRIORITY}"
        ));
    }
    if rule.conditions.is_empty() {
        errors.push("Rule must have at least one condition".to_string());
    }

    for (index, condition) in rule.conditions.iter().enumerate() {
        if condition.value.is_empty() {
            errors.push(format!("Condition {index} has an empty value"));
        }
        if condition.operator == ConditionOperator::Matches
            && condition.value.as_str().is_none()
        {
            errors.push(format!(
                "Condition {index} uses 'matches' but its value is not a string pattern"
            ));
        }
    }

    RuleValidation {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_rule() -> PermissionRule {
        PermissionRule::new(
            "Allow reading text files",
            OperationKind::Read,
            ResourceScope::File,
            PermissionDecision::Allow,
        )
        .with_description("Common text formats are safe to read")
        .with_condition(RuleCondition::extension_in(["txt", "md"]))
        .with_priority(100)
    }

    #[test]
    fn test_rule_builder() {
        let rule = valid_rule();
        assert_eq!(rule.operation, OperationKind::Read);
        assert_eq!(rule.decision, PermissionDecision::Allow);
        assert_eq!(rule.priority, 100);
        assert!(rule.enabled);
        assert!(!rule.audit_required);
        assert_eq!(rule.conditions.len(), 1);
    }

    #[test]
    fn test_validate_accepts_valid_rule() {
        let validation = validate_rule(&valid_rule());
        assert!(validation.valid, "errors: {:?}", validation.errors);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut rule = valid_rule();
        rule.name = "  ".into();
        rule.description = String::new();
        rule.conditions.clear();

        let validation = validate_rule(&rule);
        assert!(!validation.valid);
        assert_eq!(validation.errors.len(), 3);
    }

    #[test]
    fn test_validate_rejects_out_of_range_priority() {
        let rule = valid_rule().with_priority(1001);
        let validation = validate_rule(&rule);
        assert!(!validation.valid);
        assert!(validation.errors[0].contains("priority"));
    }

    #[test]
    fn test_validate_rejects_bad_matches_value() {
        let rule = valid_rule().with_condition(RuleCondition::new(
            ConditionType::FilePattern,
            ConditionOperator::Matches,
            ConditionValue::Num(4.0),
        ));
        let validation = validate_rule(&rule);
        assert!(!validation.valid);
    }

    #[test]
    fn test_condition_value_items() {
        let scalar = ConditionValue::Str("txt".into());
        assert_eq!(scalar.items().len(), 1);

        let list: ConditionValue = vec!["txt", "md"].into();
        assert_eq!(list.items().len(), 2);
        assert_eq!(list.items()[1].as_str(), Some("md"));
    }

    #[test]
    fn test_condition_value_serde_untagged() {
        let v: ConditionValue = serde_json::from_str("[\"txt\", 42]").unwrap();
        match &v {
            ConditionValue::List(items) => {
                assert_eq!(items[0].as_str(), Some("txt"));
                assert_eq!(items[1].as_num(), Some(42.0));
            }
            other => panic!("expected list, got {other:?}"),
        }

        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[\"txt\",42.0]");
    }

    #[test]
    fn test_rule_serde_defaults() {
        let rule = valid_rule();
        let mut json: serde_json::Value = serde_json::to_value(&rule).unwrap();
        // Simulate a stored rule written before `enabled` existed
        json.as_object_mut().unwrap().remove("enabled");
        let back: PermissionRule = serde_json::from_value(json).unwrap();
        assert!(back.enabled);
    }
}
