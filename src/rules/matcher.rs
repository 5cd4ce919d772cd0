//! Rule matching
//!
//! A rule matches a context when its operation equals the context's
//! operation, its scope covers the context's scope, and every condition
//! evaluates true after negation. An empty condition list is vacuously
//! true, so a rule with no conditions acts as a blanket rule for its
//! operation and scope; validation normally rejects such rules, but rules
//! constructed directly keep this behavior.

use serde::{Deserialize, Serialize};

use crate::core::context::PermissionContext;
use crate::core::types::{PermissionDecision, RiskLevel};

use super::conditions::{evaluate_condition, ConditionEnv};
use super::rule::PermissionRule;

/// Check whether a single rule matches a context
pub async fn rule_matches(
    rule: &PermissionRule,
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> bool {
    if rule.operation != context.operation {
        return false;
    }
    if !rule.scope.covers(context.scope) {
        return false;
    }

    for condition in &rule.conditions {
        let raw = evaluate_condition(condition, context, env).await;
        // XOR with negate: a satisfied condition fails the rule when negated
        if raw == condition.negate {
            return false;
        }
    }

    true
}

/// Find the winning rule among a profile's rules
///
/// Only enabled rules participate. Rules are sorted by priority descending
/// with a stable sort, so equal priorities keep their profile order; the
/// first match wins.
pub async fn find_matching_rule<'r>(
    rules: &'r [PermissionRule],
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> Option<&'r PermissionRule> {
    let mut candidates: Vec<&PermissionRule> = rules.iter().filter(|r| r.enabled).collect();
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

    for rule in candidates {
        if rule_matches(rule, context, env).await {
            return Some(rule);
        }
    }
    None
}

/// Outcome of a permission evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResult {
    /// The recommended decision
    pub decision: PermissionDecision,

    /// The winning rule, if one matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<PermissionRule>,

    /// Human-readable explanation of the decision
    pub reason: String,

    pub risk_level: RiskLevel,

    /// True iff the decision is Prompt
    pub requires_confirmation: bool,

    /// Wall-clock cost of the evaluation in milliseconds
    pub evaluation_time_ms: u64,

    /// True iff the decision may be reused from the cache
    pub cacheable: bool,

    /// Cache lifetime override in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_timeout: Option<u64>,
}

impl PermissionResult {
    fn base(decision: PermissionDecision, reason: String, risk_level: RiskLevel) -> Self {
        Self {
            decision,
            matched_rule: None,
            reason,
            risk_level,
            requires_confirmation: decision == PermissionDecision::Prompt,
            evaluation_time_ms: 0,
            cacheable: decision.is_cacheable(),
            cache_timeout: None,
        }
    }

    /// Result carrying a matched rule's decision and risk level
    pub fn from_rule(rule: &PermissionRule) -> Self {
        let mut result = Self::base(
            rule.decision,
            format!("Matched rule: {}", rule.name),
            rule.risk_level,
        );
        result.matched_rule = Some(rule.clone());
        result
    }

    /// Result for a profile's default decision when no rule matched
    pub fn from_default(decision: PermissionDecision, profile_name: &str) -> Self {
        Self::base(
            decision,
            format!("No matching rule - using profile default ({profile_name})"),
            RiskLevel::Medium,
        )
    }

    /// Prompt result with an explicit reason (disabled engine, missing
    /// profile, evaluation failure)
    pub fn prompt(reason: impl Into<String>) -> Self {
        Self::base(PermissionDecision::Prompt, reason.into(), RiskLevel::Medium)
    }

    /// Synthesized result for a manual approval or denial
    pub fn manual(decision: PermissionDecision, reason: impl Into<String>) -> Self {
        Self::base(decision, reason.into(), RiskLevel::Medium)
    }

    pub fn with_evaluation_time(mut self, elapsed_ms: u64) -> Self {
        self.evaluation_time_ms = elapsed_ms;
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == PermissionDecision::Allow
    }
}
