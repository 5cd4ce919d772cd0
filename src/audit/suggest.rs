//! Rule suggestion miner
//!
//! Mines the audit log for operation+extension groups whose outcomes are
//! consistent enough to be worth a standing rule. Candidates are returned
//! to the host for review; nothing is persisted here.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::core::ids::IdGenerator;
use crate::core::types::{OperationKind, PermissionDecision, ResourceScope, RiskLevel};
use crate::rules::{file_extension, PermissionRule, RuleCondition};

use super::log::PermissionAuditEntry;

/// Minimum decisions a group needs before a rule is suggested
const MIN_GROUP_SIZE: usize = 5;

/// Share of the group the dominant decision must hold
const DOMINANCE_THRESHOLD: f64 = 0.8;

/// Propose rules from recent audit history
///
/// Groups entries from the lookback window by (operation, extension); any
/// group of at least five decisions where one decision holds at least 80 %
/// of the outcomes yields a candidate rule for that decision.
pub fn suggested_rules(
    entries: &[PermissionAuditEntry],
    lookback_days: i64,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> Vec<PermissionRule> {
    let cutoff = now - Duration::days(lookback_days);

    let mut groups: HashMap<(OperationKind, String), Vec<PermissionDecision>> = HashMap::new();
    for entry in entries {
        if entry.context.timestamp < cutoff {
            continue;
        }
        let extension = file_extension(&entry.context.uri);
        if extension.is_empty() {
            continue;
        }
        groups
            .entry((entry.context.operation, extension))
            .or_default()
            .push(entry.result.decision);
    }

    let mut candidates: Vec<(usize, PermissionRule)> = Vec::new();
    for ((operation, extension), decisions) in groups {
        let total = decisions.len();
        if total < MIN_GROUP_SIZE {
            continue;
        }

        let mut counts: HashMap<PermissionDecision, usize> = HashMap::new();
        for decision in &decisions {
            *counts.entry(*decision).or_insert(0) += 1;
        }
        let (&dominant, &count) = counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .expect("non-empty group");

        let share = count as f64 / total as f64;
        if share < DOMINANCE_THRESHOLD {
            continue;
        }

        candidates.push((total, candidate_rule(operation, &extension, dominant, total, share, now, ids)));
    }

    // Largest evidence base first; extension breaks ties deterministically
    candidates.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.name.cmp(&b.1.name))
    });
    candidates.into_iter().map(|(_, rule)| rule).collect()
}

fn candidate_rule(
    operation: OperationKind,
    extension: &str,
    decision: PermissionDecision,
    total: usize,
    share: f64,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> PermissionRule {
    let verb = match decision {
        PermissionDecision::Allow => "Allow",
        PermissionDecision::Deny => "Deny",
        PermissionDecision::Prompt => "Prompt for",
    };
    let risk_level = if decision == PermissionDecision::Allow {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    };

    let mut rule = PermissionRule::new(
        format!("{verb} {operation} of .{extension} files"),
        operation,
        ResourceScope::File,
        decision,
    )
    .with_description(format!(
        "Suggested from {total} recent decisions, {:.0}% {decision}",
        share * 100.0
    ))
    .with_risk_level(risk_level)
    .with_condition(RuleCondition::extension_in([extension]))
    .with_priority(100);

    rule.id = ids.generate();
    rule.created_at = now;
    rule.modified_at = now;
    rule
}
