//! Built-in profile factory
//!
//! Seeds the three factory profiles on engine startup. Seeding is
//! idempotent: a built-in profile is only created when no built-in profile
//! for its security level exists yet, so restoring persisted state never
//! duplicates them. If nothing is active afterwards, conservative is
//! activated.

use crate::core::error::EngineResult;
use crate::core::types::{OperationKind, PermissionDecision, ResourceScope, RiskLevel, SecurityLevel};
use crate::rules::{PermissionRule, RuleCondition};

use super::profile::ProfileDraft;
use super::store::ProfileStore;

/// Extensions considered safe to read under every posture
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "json", "yaml", "yml", "toml", "xml", "csv", "log", "ini", "cfg",
];

/// Source and web formats added by the balanced read allow-list
const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "ts", "jsx", "tsx", "py", "rs", "go", "java", "c", "cpp", "h", "hpp", "rb", "php",
    "css", "html", "sql",
];

/// Extensions no profile should let an agent write unprompted
const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bat", "cmd", "sh", "ps1", "msi", "app", "com", "scr",
];

/// Minimal deny set kept even by the permissive profile
const SYSTEM_EXTENSIONS: &[&str] = &["exe", "dll", "sys", "so"];

fn allow_read_rule(name: &str, description: &str, extensions: &[&str]) -> PermissionRule {
    PermissionRule::new(
        name,
        OperationKind::Read,
        ResourceScope::File,
        PermissionDecision::Allow,
    )
    .with_description(description)
    .with_risk_level(RiskLevel::Low)
    .with_condition(RuleCondition::extension_in(extensions.iter().copied()))
    .with_priority(100)
}

fn deny_write_rule(name: &str, description: &str, extensions: &[&str]) -> PermissionRule {
    PermissionRule::new(
        name,
        OperationKind::Write,
        ResourceScope::File,
        PermissionDecision::Deny,
    )
    .with_description(description)
    .with_risk_level(RiskLevel::Critical)
    .with_condition(RuleCondition::extension_in(extensions.iter().copied()))
    .with_priority(200)
    .with_audit_required(true)
}

fn conservative_draft() -> ProfileDraft {
    ProfileDraft::new("Conservative")
        .with_description("Prompt for everything except reading common text formats")
        .with_security_level(SecurityLevel::Conservative)
        .with_default_decision(PermissionDecision::Prompt)
        .with_rules(vec![
            allow_read_rule(
                "Allow reading common text files",
                "Plain text and config formats carry no execution risk",
                TEXT_EXTENSIONS,
            ),
            deny_write_rule(
                "Deny writing executable files",
                "Agents must never modify executables or shell entry points",
                EXECUTABLE_EXTENSIONS,
            ),
        ])
        .built_in()
}

fn balanced_draft() -> ProfileDraft {
    let text_and_source: Vec<&str> = TEXT_EXTENSIONS
        .iter()
        .chain(SOURCE_EXTENSIONS.iter())
        .copied()
        .collect();

    let write_allow = PermissionRule::new(
        "Allow writing documents and data files",
        OperationKind::Write,
        ResourceScope::File,
        PermissionDecision::Allow,
    )
    .with_description("Reversible edits to text and data formats")
    .with_risk_level(RiskLevel::Medium)
    .with_condition(RuleCondition::extension_in(["txt", "md", "json", "yaml", "yml", "csv"]))
    .with_priority(90);

    ProfileDraft::new("Balanced")
        .with_description("Auto-approve routine reads and low-risk writes, prompt otherwise")
        .with_security_level(SecurityLevel::Balanced)
        .with_default_decision(PermissionDecision::Prompt)
        .with_rules(vec![
            allow_read_rule(
                "Allow reading project files",
                "Text, config and source formats are safe to read",
                &text_and_source,
            ),
            write_allow,
            deny_write_rule(
                "Deny writing executable files",
                "Agents must never modify executables or shell entry points",
                EXECUTABLE_EXTENSIONS,
            ),
        ])
        .built_in()
}

fn permissive_draft() -> ProfileDraft {
    ProfileDraft::new("Permissive")
        .with_description("Auto-approve everything except writes to system executables")
        .with_security_level(SecurityLevel::Permissive)
        .with_default_decision(PermissionDecision::Allow)
        .with_rules(vec![deny_write_rule(
            "Deny writing system executables",
            "Binary and system formats stay off limits even in permissive mode",
            SYSTEM_EXTENSIONS,
        )])
        .built_in()
}

/// Seed missing built-in profiles and pick a default active profile
///
/// Returns the ids of profiles that were created by this call.
pub async fn ensure_built_in_profiles(store: &ProfileStore) -> EngineResult<Vec<String>> {
    let mut created = Vec::new();

    for (level, draft) in [
        (SecurityLevel::Conservative, conservative_draft()),
        (SecurityLevel::Balanced, balanced_draft()),
        (SecurityLevel::Permissive, permissive_draft()),
    ] {
        if store.find_built_in(level).await.is_none() {
            let id = store.create_profile(draft).await?;
            tracing::info!(profile_id = %id, %level, "seeded built-in profile");
            created.push(id);
        }
    }

    if store.active_profile_id().await.is_none() {
        if let Some(conservative) = store.find_built_in(SecurityLevel::Conservative).await {
            store.set_active_profile(&conservative.id).await?;
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::ids::SequentialIdGenerator;
    use crate::events::EventBus;
    use crate::rules::validate_rule;
    use std::sync::Arc;

    fn store() -> ProfileStore {
        ProfileStore::new(
            Arc::new(EventBus::new()),
            Arc::new(SystemClock),
            Arc::new(SequentialIdGenerator::new("p")),
        )
    }

    #[tokio::test]
    async fn test_seeds_three_profiles_and_activates_conservative() {
        let store = store();
        let created = ensure_built_in_profiles(&store).await.unwrap();
        assert_eq!(created.len(), 3);

        let active = store.active_profile().await.unwrap();
        assert_eq!(active.security_level, SecurityLevel::Conservative);
        assert_eq!(active.default_decision, PermissionDecision::Prompt);
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = store();
        ensure_built_in_profiles(&store).await.unwrap();
        let created_again = ensure_built_in_profiles(&store).await.unwrap();

        assert!(created_again.is_empty());
        assert_eq!(store.list_profiles().await.len(), 3);
    }

    #[tokio::test]
    async fn test_does_not_steal_an_existing_active_profile() {
        let store = store();
        let custom = store
            .create_profile(ProfileDraft::new("Custom"))
            .await
            .unwrap();
        store.set_active_profile(&custom).await.unwrap();

        ensure_built_in_profiles(&store).await.unwrap();
        assert_eq!(store.active_profile().await.unwrap().id, custom);
    }

    #[tokio::test]
    async fn test_built_in_rules_pass_validation() {
        let store = store();
        ensure_built_in_profiles(&store).await.unwrap();

        for profile in store.list_profiles().await {
            for rule in &profile.rules {
                let validation = validate_rule(rule);
                assert!(
                    validation.valid,
                    "rule '{}' invalid: {:?}",
                    rule.name, validation.errors
                );
            }
        }
    }

    #[tokio::test]
    async fn test_permissive_defaults_to_allow() {
        let store = store();
        ensure_built_in_profiles(&store).await.unwrap();

        let permissive = store.find_built_in(SecurityLevel::Permissive).await.unwrap();
        assert_eq!(permissive.default_decision, PermissionDecision::Allow);
        assert_eq!(permissive.rules.len(), 1);
        assert_eq!(permissive.rules[0].decision, PermissionDecision::Deny);
        assert_eq!(permissive.rules[0].priority, 200);
    }
}
