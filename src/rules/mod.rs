//! Permission rules: the data model, condition evaluators and matcher
//!
//! A `PermissionRule` maps an operation and scope to a decision, guarded by
//! zero or more `RuleCondition`s. `rule_matches` applies the scope
//! hierarchy and ANDs the condition results; `find_matching_rule` picks the
//! highest-priority enabled match with stable tie-breaking.

pub mod conditions;
pub mod matcher;
pub mod rule;

pub use conditions::{
    evaluate_condition, file_extension, ActivitySource, ConditionEnv, FileSystemProbe,
    WorkspaceProbe,
};
pub use matcher::{find_matching_rule, rule_matches, PermissionResult};
pub use rule::{
    validate_rule, ConditionOperator, ConditionType, ConditionValue, PermissionRule,
    RuleCondition, RuleValidation, MAX_RULE_PRIORITY,
};
