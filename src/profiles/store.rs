//! Profile store
//!
//! Owns every profile and the active-profile pointer. All profile and rule
//! mutations go through here so the built-in immutability invariant and
//! version bumps cannot be bypassed. Every mutation emits a
//! `ProfileChange` event; the engine persists on those events.
//!
//! Profiles are kept in a `Vec` in insertion order; rule tie-breaking and
//! export stability depend on that order, and profile counts are small
//! enough that id lookups scan.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::clock::Clock;
use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::IdGenerator;
use crate::events::{EngineEvent, EventBus, ProfileChangeKind};
use crate::rules::PermissionRule;

use super::profile::{PermissionProfile, ProfileDraft, ProfileUpdate};

pub struct ProfileStore {
    profiles: RwLock<Vec<PermissionProfile>>,
    active_id: RwLock<Option<String>>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl ProfileStore {
    pub fn new(events: Arc<EventBus>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            profiles: RwLock::new(Vec::new()),
            active_id: RwLock::new(None),
            events,
            clock,
            ids,
        }
    }

    /// Create a profile from a draft; returns the new id
    pub async fn create_profile(&self, draft: ProfileDraft) -> EngineResult<String> {
        let now = self.clock.now();
        let id = self.ids.generate();
        let profile = PermissionProfile {
            id: id.clone(),
            name: draft.name,
            description: draft.description,
            is_built_in: draft.is_built_in,
            is_active: false,
            is_default: draft.is_default,
            rules: draft.rules,
            default_decision: draft.default_decision,
            security_level: draft.security_level,
            created_at: now,
            modified_at: now,
            version: 1,
        };

        tracing::info!(profile_id = %id, name = %profile.name, "creating permission profile");
        self.profiles.write().await.push(profile);
        self.emit_change(ProfileChangeKind::ProfileCreated, &id, None);
        Ok(id)
    }

    /// Merge a partial update into a profile
    ///
    /// Rejects rule-set replacement on built-in profiles. Bumps
    /// `modified_at` and `version`.
    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> EngineResult<()> {
        let now = self.clock.now();
        {
            let mut profiles = self.profiles.write().await;
            let profile = profiles
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| EngineError::ProfileNotFound(id.to_string()))?;

            if profile.is_built_in && update.touches_rules() {
                return Err(EngineError::BuiltInImmutable(profile.name.clone()));
            }

            if let Some(name) = update.name {
                profile.name = name;
            }
            if let Some(description) = update.description {
                profile.description = description;
            }
            if let Some(rules) = update.rules {
                profile.rules = rules;
            }
            if let Some(decision) = update.default_decision {
                profile.default_decision = decision;
            }
            if let Some(level) = update.security_level {
                profile.security_level = level;
            }
            if let Some(is_default) = update.is_default {
                profile.is_default = is_default;
            }

            profile.modified_at = now;
            profile.version += 1;
        }

        self.emit_change(ProfileChangeKind::ProfileUpdated, id, None);
        Ok(())
    }

    /// Delete a non-built-in profile
    ///
    /// If the deleted profile was active, the active pointer is cleared.
    pub async fn delete_profile(&self, id: &str) -> EngineResult<()> {
        {
            let mut profiles = self.profiles.write().await;
            let index = profiles
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| EngineError::ProfileNotFound(id.to_string()))?;

            if profiles[index].is_built_in {
                return Err(EngineError::BuiltInImmutable(profiles[index].name.clone()));
            }
            profiles.remove(index);
        }

        let mut active = self.active_id.write().await;
        if active.as_deref() == Some(id) {
            tracing::warn!(profile_id = %id, "deleted the active profile, no profile is active");
            *active = None;
        }
        drop(active);

        self.emit_change(ProfileChangeKind::ProfileDeleted, id, None);
        Ok(())
    }

    /// All profiles in insertion order
    pub async fn list_profiles(&self) -> Vec<PermissionProfile> {
        self.profiles.read().await.clone()
    }

    pub async fn get_profile(&self, id: &str) -> Option<PermissionProfile> {
        self.profiles.read().await.iter().find(|p| p.id == id).cloned()
    }

    /// Find a built-in profile by security level (used for idempotent
    /// factory seeding)
    pub async fn find_built_in(
        &self,
        level: crate::core::types::SecurityLevel,
    ) -> Option<PermissionProfile> {
        self.profiles
            .read()
            .await
            .iter()
            .find(|p| p.is_built_in && p.security_level == level)
            .cloned()
    }

    /// Activate a profile, deactivating the previous one
    pub async fn set_active_profile(&self, id: &str) -> EngineResult<()> {
        {
            let mut profiles = self.profiles.write().await;
            if !profiles.iter().any(|p| p.id == id) {
                return Err(EngineError::ProfileNotFound(id.to_string()));
            }
            for profile in profiles.iter_mut() {
                profile.is_active = profile.id == id;
            }
        }
        *self.active_id.write().await = Some(id.to_string());

        tracing::info!(profile_id = %id, "activated permission profile");
        self.emit_change(ProfileChangeKind::ProfileActivated, id, None);
        Ok(())
    }

    pub async fn active_profile_id(&self) -> Option<String> {
        self.active_id.read().await.clone()
    }

    pub async fn active_profile(&self) -> Option<PermissionProfile> {
        let id = self.active_id.read().await.clone()?;
        self.get_profile(&id).await
    }

    /// Append a rule to a non-built-in profile; returns the rule id
    pub async fn add_rule(&self, profile_id: &str, rule: PermissionRule) -> EngineResult<String> {
        let now = self.clock.now();
        let rule_id = rule.id.clone();
        {
            let mut profiles = self.profiles.write().await;
            let profile = profiles
                .iter_mut()
                .find(|p| p.id == profile_id)
                .ok_or_else(|| EngineError::ProfileNotFound(profile_id.to_string()))?;

            if profile.is_built_in {
                return Err(EngineError::BuiltInImmutable(profile.name.clone()));
            }

            tracing::info!(
                profile_id = %profile_id,
                rule = %rule.name,
                priority = rule.priority,
                "adding permission rule"
            );
            profile.rules.push(rule);
            profile.modified_at = now;
            profile.version += 1;
        }

        self.emit_change(ProfileChangeKind::RuleAdded, profile_id, Some(&rule_id));
        Ok(rule_id)
    }

    /// Replace a rule in place, matched by `rule.id`
    pub async fn update_rule(&self, profile_id: &str, mut rule: PermissionRule) -> EngineResult<()> {
        let now = self.clock.now();
        let rule_id = rule.id.clone();
        {
            let mut profiles = self.profiles.write().await;
            let profile = profiles
                .iter_mut()
                .find(|p| p.id == profile_id)
                .ok_or_else(|| EngineError::ProfileNotFound(profile_id.to_string()))?;

            if profile.is_built_in {
                return Err(EngineError::BuiltInImmutable(profile.name.clone()));
            }

            let slot = profile
                .rules
                .iter_mut()
                .find(|r| r.id == rule_id)
                .ok_or_else(|| EngineError::RuleNotFound(rule_id.clone()))?;

            rule.modified_at = now;
            *slot = rule;
            profile.modified_at = now;
            profile.version += 1;
        }

        self.emit_change(ProfileChangeKind::RuleUpdated, profile_id, Some(&rule_id));
        Ok(())
    }

    /// Remove a rule from a non-built-in profile
    pub async fn delete_rule(&self, profile_id: &str, rule_id: &str) -> EngineResult<()> {
        let now = self.clock.now();
        {
            let mut profiles = self.profiles.write().await;
            let profile = profiles
                .iter_mut()
                .find(|p| p.id == profile_id)
                .ok_or_else(|| EngineError::ProfileNotFound(profile_id.to_string()))?;

            if profile.is_built_in {
                return Err(EngineError::BuiltInImmutable(profile.name.clone()));
            }

            let index = profile
                .rules
                .iter()
                .position(|r| r.id == rule_id)
                .ok_or_else(|| EngineError::RuleNotFound(rule_id.to_string()))?;
            profile.rules.remove(index);
            profile.modified_at = now;
            profile.version += 1;
        }

        self.emit_change(ProfileChangeKind::RuleDeleted, profile_id, Some(rule_id));
        Ok(())
    }

    /// Restore profiles and the active pointer from persisted state
    ///
    /// Does not emit change events; the state being loaded is already the
    /// persisted one.
    pub async fn restore(
        &self,
        profiles: Vec<PermissionProfile>,
        active_id: Option<String>,
    ) {
        let mut stored = self.profiles.write().await;
        *stored = profiles;
        // The active flag is derived from the pointer, not trusted from disk
        for profile in stored.iter_mut() {
            profile.is_active = active_id.as_deref() == Some(profile.id.as_str());
        }
        drop(stored);
        *self.active_id.write().await = active_id;
    }

    fn emit_change(&self, kind: ProfileChangeKind, profile_id: &str, rule_id: Option<&str>) {
        self.events.emit(&EngineEvent::ProfileChange {
            kind,
            profile_id: profile_id.to_string(),
            rule_id: rule_id.map(str::to_string),
            timestamp: self.clock.now(),
        });
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::ids::SequentialIdGenerator;
    use crate::core::types::{OperationKind, PermissionDecision, ResourceScope};
    use crate::rules::RuleCondition;

    fn store() -> ProfileStore {
        ProfileStore::new(
            Arc::new(EventBus::new()),
            Arc::new(SystemClock),
            Arc::new(SequentialIdGenerator::new("profile")),
        )
    }

    fn sample_rule() -> PermissionRule {
        PermissionRule::new(
            "Allow reading text",
            OperationKind::Read,
            ResourceScope::File,
            PermissionDecision::Allow,
        )
        .with_description("test rule")
        .with_condition(RuleCondition::extension_in(["txt"]))
        .with_priority(100)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let id = store
            .create_profile(ProfileDraft::new("Mine").with_description("custom"))
            .await
            .unwrap();

        let profile = store.get_profile(&id).await.unwrap();
        assert_eq!(profile.name, "Mine");
        assert_eq!(profile.version, 1);
        assert!(!profile.is_built_in);
        assert!(!profile.is_active);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_modified() {
        let store = store();
        let id = store.create_profile(ProfileDraft::new("Mine")).await.unwrap();

        store
            .update_profile(&id, ProfileUpdate::new().description("updated"))
            .await
            .unwrap();

        let profile = store.get_profile(&id).await.unwrap();
        assert_eq!(profile.description, "updated");
        assert_eq!(profile.version, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_profile_is_not_found() {
        let store = store();
        let err = store
            .update_profile("missing", ProfileUpdate::new().name("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_built_in_rules_are_immutable() {
        let store = store();
        let id = store
            .create_profile(ProfileDraft::new("Factory").built_in())
            .await
            .unwrap();

        // Non-rule updates are allowed
        store
            .update_profile(&id, ProfileUpdate::new().description("renamed"))
            .await
            .unwrap();

        // Any rule-set mutation is forbidden
        let err = store
            .update_profile(&id, ProfileUpdate::new().rules(vec![sample_rule()]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BuiltInImmutable(_)));

        let err = store.add_rule(&id, sample_rule()).await.unwrap_err();
        assert!(matches!(err, EngineError::BuiltInImmutable(_)));

        let err = store.delete_rule(&id, "any").await.unwrap_err();
        assert!(matches!(err, EngineError::BuiltInImmutable(_)));

        let err = store.delete_profile(&id).await.unwrap_err();
        assert!(matches!(err, EngineError::BuiltInImmutable(_)));
    }

    #[tokio::test]
    async fn test_set_active_deactivates_previous() {
        let store = store();
        let first = store.create_profile(ProfileDraft::new("First")).await.unwrap();
        let second = store.create_profile(ProfileDraft::new("Second")).await.unwrap();

        store.set_active_profile(&first).await.unwrap();
        assert!(store.get_profile(&first).await.unwrap().is_active);

        store.set_active_profile(&second).await.unwrap();
        assert!(!store.get_profile(&first).await.unwrap().is_active);
        assert!(store.get_profile(&second).await.unwrap().is_active);
        assert_eq!(store.active_profile().await.unwrap().id, second);
    }

    #[tokio::test]
    async fn test_delete_active_clears_pointer() {
        let store = store();
        let id = store.create_profile(ProfileDraft::new("Mine")).await.unwrap();
        store.set_active_profile(&id).await.unwrap();

        store.delete_profile(&id).await.unwrap();
        assert!(store.active_profile().await.is_none());
    }

    #[tokio::test]
    async fn test_rule_crud() {
        let store = store();
        let id = store.create_profile(ProfileDraft::new("Mine")).await.unwrap();

        let rule_id = store.add_rule(&id, sample_rule()).await.unwrap();
        assert_eq!(store.get_profile(&id).await.unwrap().rules.len(), 1);

        let mut updated = store
            .get_profile(&id)
            .await
            .unwrap()
            .rule(&rule_id)
            .unwrap()
            .clone();
        updated.priority = 500;
        store.update_rule(&id, updated).await.unwrap();
        assert_eq!(
            store.get_profile(&id).await.unwrap().rule(&rule_id).unwrap().priority,
            500
        );

        store.delete_rule(&id, &rule_id).await.unwrap();
        assert!(store.get_profile(&id).await.unwrap().rules.is_empty());

        let err = store.delete_rule(&id, &rule_id).await.unwrap_err();
        assert!(matches!(err, EngineError::RuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_mutations_emit_change_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let events = Arc::new(EventBus::new());
        let store = ProfileStore::new(
            events.clone(),
            Arc::new(SystemClock),
            Arc::new(SequentialIdGenerator::new("profile")),
        );

        let changes = Arc::new(AtomicUsize::new(0));
        let changes_clone = changes.clone();
        events.subscribe(move |event| {
            if matches!(event, EngineEvent::ProfileChange { .. }) {
                changes_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        let id = store.create_profile(ProfileDraft::new("Mine")).await.unwrap();
        store.add_rule(&id, sample_rule()).await.unwrap();
        store.set_active_profile(&id).await.unwrap();

        assert_eq!(changes.load(Ordering::SeqCst), 3);
    }
}
