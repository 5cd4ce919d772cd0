//! Condition evaluators
//!
//! One evaluator per `ConditionType`. Evaluators that need the outside
//! world (file size, workspace membership, recent activity) go through the
//! probe traits defined here; an absent filesystem or workspace probe
//! degrades the condition to satisfied rather than failing the rule. Any
//! evaluator error is logged and treated as a non-match for that condition
//! only, never aborting the whole evaluation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;

use crate::core::context::PermissionContext;
use crate::core::types::OperationKind;

use super::rule::{ConditionOperator, ConditionType, RuleCondition};

/// Resolves file sizes for `FileSize` conditions
#[async_trait]
pub trait FileSystemProbe: Send + Sync {
    /// Size of the resource in bytes, or `None` if it cannot be determined
    async fn file_size(&self, uri: &str) -> Option<u64>;
}

/// Resolves workspace roots for `WorkspaceRoot` conditions
#[async_trait]
pub trait WorkspaceProbe: Send + Sync {
    /// Root paths of the currently open workspace(s)
    async fn workspace_roots(&self) -> Vec<String>;
}

/// Answers `RecentActivity` lookbacks; implemented by the audit log
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Whether any prior entry exists for the same resource and operation
    /// within the given lookback window
    async fn has_recent_activity(
        &self,
        uri: &str,
        operation: OperationKind,
        within_minutes: f64,
        now: DateTime<Utc>,
    ) -> bool;
}

/// Everything a condition may consult during evaluation
pub struct ConditionEnv<'a> {
    pub fs: Option<&'a dyn FileSystemProbe>,
    pub workspace: Option<&'a dyn WorkspaceProbe>,
    pub activity: Option<&'a dyn ActivitySource>,
    /// Evaluation wall clock, taken once per evaluation
    pub now: DateTime<Utc>,
}

impl<'a> ConditionEnv<'a> {
    /// Environment with no probes, pinned at the given instant
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            fs: None,
            workspace: None,
            activity: None,
            now,
        }
    }

    pub fn with_fs(mut self, fs: &'a dyn FileSystemProbe) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn with_workspace(mut self, workspace: &'a dyn WorkspaceProbe) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_activity(mut self, activity: &'a dyn ActivitySource) -> Self {
        self.activity = Some(activity);
        self
    }
}

/// Lowercase extension of the path's final component, empty if none
pub fn file_extension(uri: &str) -> String {
    Path::new(uri)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

type CondResult = Result<bool, String>;

/// Evaluate one condition against a context
///
/// The raw boolean result is returned as-is; the matcher applies `negate`.
/// Errors degrade to `false` with a warning.
pub async fn evaluate_condition(
    condition: &RuleCondition,
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> bool {
    match evaluate_inner(condition, context, env).await {
        Ok(result) => result,
        Err(reason) => {
            tracing::warn!(
                condition = ?condition.condition_type,
                operator = ?condition.operator,
                uri = %context.uri,
                %reason,
                "condition evaluation failed, treating as non-match"
            );
            false
        }
    }
}

async fn evaluate_inner(
    condition: &RuleCondition,
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> CondResult {
    match condition.condition_type {
        ConditionType::FileExtension => eval_file_extension(condition, &context.uri),
        ConditionType::FilePattern | ConditionType::FilePath => {
            eval_path(condition, &context.uri)
        }
        ConditionType::FileSize => eval_file_size(condition, context, env).await,
        ConditionType::WorkspaceRoot => eval_workspace_root(context, env).await,
        ConditionType::TimeOfDay => eval_time_of_day(condition, env),
        ConditionType::RecentActivity => eval_recent_activity(condition, context, env).await,
    }
}

fn eval_file_extension(condition: &RuleCondition, uri: &str) -> CondResult {
    let extension = file_extension(uri);
    match condition.operator {
        ConditionOperator::Equals => Ok(condition
            .value
            .items()
            .iter()
            .filter_map(|v| v.as_str())
            .any(|v| v.eq_ignore_ascii_case(&extension))),
        ConditionOperator::Contains => Ok(condition
            .value
            .items()
            .iter()
            .filter_map(|v| v.as_str())
            .any(|v| extension.contains(&v.to_ascii_lowercase()))),
        other => Err(format!("operator {other:?} not supported for file extensions")),
    }
}

fn eval_path(condition: &RuleCondition, uri: &str) -> CondResult {
    let values: Vec<&str> = condition
        .value
        .items()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    if values.is_empty() {
        return Err("path condition has no string value".to_string());
    }

    match condition.operator {
        ConditionOperator::Equals => Ok(values.iter().any(|v| uri == *v)),
        ConditionOperator::Contains => Ok(values.iter().any(|v| uri.contains(v))),
        ConditionOperator::StartsWith => Ok(values.iter().any(|v| uri.starts_with(v))),
        ConditionOperator::EndsWith => Ok(values.iter().any(|v| uri.ends_with(v))),
        ConditionOperator::Matches => {
            let pattern = condition
                .value
                .as_str()
                .ok_or_else(|| "matches requires a single string pattern".to_string())?;
            let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern: {e}"))?;
            Ok(regex.is_match(uri))
        }
        other => Err(format!("operator {other:?} not supported for paths")),
    }
}

async fn eval_file_size(
    condition: &RuleCondition,
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> CondResult {
    // No probe, or a file whose size cannot be read: the condition is
    // satisfied rather than failing the whole rule.
    let Some(fs) = env.fs else {
        return Ok(true);
    };
    let Some(size) = fs.file_size(&context.uri).await else {
        return Ok(true);
    };
    let size = size as f64;

    match condition.operator {
        ConditionOperator::Equals => {
            let limit = require_num(condition)?;
            Ok((size - limit).abs() < f64::EPSILON)
        }
        ConditionOperator::LessThan => Ok(size < require_num(condition)?),
        ConditionOperator::GreaterThan => Ok(size > require_num(condition)?),
        ConditionOperator::Between => {
            let (low, high) = between_bounds(condition)?;
            Ok(size >= low && size <= high)
        }
        other => Err(format!("operator {other:?} not supported for file size")),
    }
}

async fn eval_workspace_root(
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> CondResult {
    let Some(workspace) = env.workspace else {
        return Ok(true);
    };
    let roots = workspace.workspace_roots().await;
    let uri = context.uri.trim_end_matches('/');
    Ok(roots.iter().any(|root| {
        let root = root.trim_end_matches('/');
        uri == root || uri.starts_with(&format!("{root}/"))
    }))
}

fn eval_time_of_day(condition: &RuleCondition, env: &ConditionEnv<'_>) -> CondResult {
    use chrono::Timelike;
    let hour = env.now.hour() as f64;

    match condition.operator {
        ConditionOperator::Equals => Ok((hour - require_num(condition)?).abs() < f64::EPSILON),
        ConditionOperator::LessThan => Ok(hour < require_num(condition)?),
        ConditionOperator::GreaterThan => Ok(hour > require_num(condition)?),
        ConditionOperator::Between => {
            let (start, end) = between_bounds(condition)?;
            if start <= end {
                Ok(hour >= start && hour <= end)
            } else {
                // Overnight window, e.g. between 22 and 6
                Ok(hour >= start || hour <= end)
            }
        }
        other => Err(format!("operator {other:?} not supported for time of day")),
    }
}

async fn eval_recent_activity(
    condition: &RuleCondition,
    context: &PermissionContext,
    env: &ConditionEnv<'_>,
) -> CondResult {
    let Some(activity) = env.activity else {
        // No audit history available means no recent activity
        return Ok(false);
    };
    let minutes = require_num(condition)?;
    Ok(activity
        .has_recent_activity(&context.uri, context.operation, minutes, env.now)
        .await)
}

fn require_num(condition: &RuleCondition) -> Result<f64, String> {
    condition
        .value
        .first_num()
        .ok_or_else(|| "condition requires a numeric value".to_string())
}

/// Two-element value, or a scalar collapsed to a degenerate range
fn between_bounds(condition: &RuleCondition) -> Result<(f64, f64), String> {
    let nums = condition.value.nums();
    match nums.as_slice() {
        [low, high, ..] => Ok((*low, *high)),
        [single] => Ok((*single, *single)),
        [] => Err("between requires numeric bounds".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourceScope;
    use crate::rules::rule::ConditionValue;

    fn ctx(uri: &str) -> PermissionContext {
        PermissionContext::new(uri, OperationKind::Read, ResourceScope::File, "test_tool")
    }

    fn env() -> ConditionEnv<'static> {
        ConditionEnv::at(Utc::now())
    }

    struct FixedSize(Option<u64>);

    #[async_trait]
    impl FileSystemProbe for FixedSize {
        async fn file_size(&self, _uri: &str) -> Option<u64> {
            self.0
        }
    }

    struct FixedRoots(Vec<String>);

    #[async_trait]
    impl WorkspaceProbe for FixedRoots {
        async fn workspace_roots(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_file_extension_extraction() {
        assert_eq!(file_extension("/a/b/report.TXT"), "txt");
        assert_eq!(file_extension("/a/b/archive.tar.gz"), "gz");
        assert_eq!(file_extension("/a/b/Makefile"), "");
        assert_eq!(file_extension("/a.v2/binary"), "");
    }

    #[tokio::test]
    async fn test_extension_equals_membership() {
        let cond = RuleCondition::extension_in(["txt", "md"]);
        assert!(evaluate_condition(&cond, &ctx("/notes.md"), &env()).await);
        assert!(!evaluate_condition(&cond, &ctx("/binary.exe"), &env()).await);
    }

    #[tokio::test]
    async fn test_extension_contains_substring() {
        let cond = RuleCondition::new(
            ConditionType::FileExtension,
            ConditionOperator::Contains,
            ConditionValue::Str("ml".into()),
        );
        assert!(evaluate_condition(&cond, &ctx("/config.yaml"), &env()).await);
        assert!(evaluate_condition(&cond, &ctx("/page.html"), &env()).await);
        assert!(!evaluate_condition(&cond, &ctx("/script.py"), &env()).await);
    }

    #[tokio::test]
    async fn test_path_operators() {
        let starts = RuleCondition::new(
            ConditionType::FilePath,
            ConditionOperator::StartsWith,
            "/workspace/",
        );
        assert!(evaluate_condition(&starts, &ctx("/workspace/a.txt"), &env()).await);
        assert!(!evaluate_condition(&starts, &ctx("/tmp/a.txt"), &env()).await);

        let ends = RuleCondition::new(
            ConditionType::FilePath,
            ConditionOperator::EndsWith,
            "_test.rs",
        );
        assert!(evaluate_condition(&ends, &ctx("/src/cache_test.rs"), &env()).await);

        let contains = RuleCondition::new(
            ConditionType::FilePath,
            ConditionOperator::Contains,
            "node_modules",
        );
        assert!(evaluate_condition(&contains, &ctx("/x/node_modules/y.js"), &env()).await);
    }

    #[tokio::test]
    async fn test_pattern_regex_matches() {
        let cond = RuleCondition::path_matches(r"\.env(\..+)?$");
        assert!(evaluate_condition(&cond, &ctx("/app/.env"), &env()).await);
        assert!(evaluate_condition(&cond, &ctx("/app/.env.local"), &env()).await);
        assert!(!evaluate_condition(&cond, &ctx("/app/environment.md"), &env()).await);
    }

    #[tokio::test]
    async fn test_invalid_regex_degrades_to_false() {
        let cond = RuleCondition::path_matches("([unclosed");
        assert!(!evaluate_condition(&cond, &ctx("/any.txt"), &env()).await);
    }

    #[tokio::test]
    async fn test_file_size_without_probe_is_satisfied() {
        let cond = RuleCondition::new(
            ConditionType::FileSize,
            ConditionOperator::LessThan,
            ConditionValue::Num(1024.0),
        );
        assert!(evaluate_condition(&cond, &ctx("/big.bin"), &env()).await);
    }

    #[tokio::test]
    async fn test_file_size_with_probe() {
        let cond = RuleCondition::new(
            ConditionType::FileSize,
            ConditionOperator::LessThan,
            ConditionValue::Num(1024.0),
        );

        let small = FixedSize(Some(10));
        let environment = ConditionEnv::at(Utc::now()).with_fs(&small);
        assert!(evaluate_condition(&cond, &ctx("/f"), &environment).await);

        let big = FixedSize(Some(10_000));
        let environment = ConditionEnv::at(Utc::now()).with_fs(&big);
        assert!(!evaluate_condition(&cond, &ctx("/f"), &environment).await);

        // Probe present but stat failed: satisfied
        let unknown = FixedSize(None);
        let environment = ConditionEnv::at(Utc::now()).with_fs(&unknown);
        assert!(evaluate_condition(&cond, &ctx("/f"), &environment).await);
    }

    #[tokio::test]
    async fn test_file_size_between() {
        let cond = RuleCondition::new(
            ConditionType::FileSize,
            ConditionOperator::Between,
            ConditionValue::List(vec![ConditionValue::Num(100.0), ConditionValue::Num(200.0)]),
        );
        let probe = FixedSize(Some(150));
        let environment = ConditionEnv::at(Utc::now()).with_fs(&probe);
        assert!(evaluate_condition(&cond, &ctx("/f"), &environment).await);
    }

    #[tokio::test]
    async fn test_workspace_root_membership() {
        let cond = RuleCondition::new(
            ConditionType::WorkspaceRoot,
            ConditionOperator::Equals,
            ConditionValue::Str("workspace".into()),
        );

        // No probe: satisfied
        assert!(evaluate_condition(&cond, &ctx("/anywhere/f.txt"), &env()).await);

        let probe = FixedRoots(vec!["/workspace".into()]);
        let environment = ConditionEnv::at(Utc::now()).with_workspace(&probe);
        assert!(evaluate_condition(&cond, &ctx("/workspace/src/f.txt"), &environment).await);
        assert!(!evaluate_condition(&cond, &ctx("/workspace2/f.txt"), &environment).await);
        assert!(!evaluate_condition(&cond, &ctx("/elsewhere/f.txt"), &environment).await);
    }

    #[tokio::test]
    async fn test_time_of_day() {
        use chrono::TimeZone;
        let afternoon = Utc.with_ymd_and_hms(2024, 6, 1, 14, 30, 0).unwrap();
        let environment = ConditionEnv::at(afternoon);

        let before_five = RuleCondition::new(
            ConditionType::TimeOfDay,
            ConditionOperator::LessThan,
            ConditionValue::Num(17.0),
        );
        assert!(evaluate_condition(&before_five, &ctx("/f"), &environment).await);

        let business_hours = RuleCondition::new(
            ConditionType::TimeOfDay,
            ConditionOperator::Between,
            ConditionValue::List(vec![ConditionValue::Num(9.0), ConditionValue::Num(17.0)]),
        );
        assert!(evaluate_condition(&business_hours, &ctx("/f"), &environment).await);

        let overnight = RuleCondition::new(
            ConditionType::TimeOfDay,
            ConditionOperator::Between,
            ConditionValue::List(vec![ConditionValue::Num(22.0), ConditionValue::Num(6.0)]),
        );
        assert!(!evaluate_condition(&overnight, &ctx("/f"), &environment).await);
    }

    #[tokio::test]
    async fn test_recent_activity_without_source_is_false() {
        let cond = RuleCondition::new(
            ConditionType::RecentActivity,
            ConditionOperator::LessThan,
            ConditionValue::Num(30.0),
        );
        assert!(!evaluate_condition(&cond, &ctx("/f.txt"), &env()).await);
    }
}
