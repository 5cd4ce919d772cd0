//! Audit statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::{OperationKind, PermissionDecision, RiskLevel};

use super::log::PermissionAuditEntry;

/// Inclusive time window for statistics queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Match frequency of one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatchCount {
    pub rule_id: String,
    pub count: usize,
}

/// Aggregated view of the audit log over a window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatistics {
    pub total_evaluations: usize,
    pub by_decision: HashMap<PermissionDecision, usize>,
    pub by_operation: HashMap<OperationKind, usize>,
    pub by_risk_level: HashMap<RiskLevel, usize>,
    pub average_evaluation_ms: f64,
    /// The ten most-matched rules, most frequent first
    pub top_rules: Vec<RuleMatchCount>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

impl PermissionStatistics {
    pub fn total(&self) -> usize {
        self.total_evaluations
    }

    /// Share of decisions that were Allow, in [0, 1]
    pub fn allow_rate(&self) -> f64 {
        if self.total_evaluations == 0 {
            return 0.0;
        }
        let allowed = self
            .by_decision
            .get(&PermissionDecision::Allow)
            .copied()
            .unwrap_or(0);
        allowed as f64 / self.total_evaluations as f64
    }
}

const TOP_RULES: usize = 10;

/// Aggregate entries, optionally restricted to a time window
pub fn compute_statistics(
    entries: &[PermissionAuditEntry],
    range: Option<TimeRange>,
) -> PermissionStatistics {
    let in_window: Vec<&PermissionAuditEntry> = entries
        .iter()
        .filter(|e| range.map_or(true, |r| r.contains(e.context.timestamp)))
        .collect();

    let mut by_decision = HashMap::new();
    let mut by_operation = HashMap::new();
    let mut by_risk_level = HashMap::new();
    let mut rule_counts: HashMap<String, usize> = HashMap::new();
    let mut total_ms = 0u64;

    for entry in &in_window {
        *by_decision.entry(entry.result.decision).or_insert(0) += 1;
        *by_operation.entry(entry.context.operation).or_insert(0) += 1;
        *by_risk_level.entry(entry.result.risk_level).or_insert(0) += 1;
        total_ms += entry.result.evaluation_time_ms;

        if let Some(rule) = &entry.result.matched_rule {
            *rule_counts.entry(rule.id.clone()).or_insert(0) += 1;
        }
    }

    let mut top_rules: Vec<RuleMatchCount> = rule_counts
        .into_iter()
        .map(|(rule_id, count)| RuleMatchCount { rule_id, count })
        .collect();
    // Frequency descending, id ascending for a deterministic order
    top_rules.sort_by(|a, b| b.count.cmp(&a.count).then(a.rule_id.cmp(&b.rule_id)));
    top_rules.truncate(TOP_RULES);

    let average_evaluation_ms = if in_window.is_empty() {
        0.0
    } else {
        total_ms as f64 / in_window.len() as f64
    };

    let (period_start, period_end) = match range {
        Some(r) => (Some(r.start), Some(r.end)),
        None => {
            let timestamps: Vec<DateTime<Utc>> =
                in_window.iter().map(|e| e.context.timestamp).collect();
            (
                timestamps.iter().min().copied(),
                timestamps.iter().max().copied(),
            )
        }
    };

    PermissionStatistics {
        total_evaluations: in_window.len(),
        by_decision,
        by_operation,
        by_risk_level,
        average_evaluation_ms,
        top_rules,
        period_start,
        period_end,
    }
}
