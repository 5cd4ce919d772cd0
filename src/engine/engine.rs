//! Permission engine façade
//!
//! `PermissionEngine` wires the profile store, rule matcher, decision
//! cache, audit log and event bus behind one entry point:
//! `evaluate_permission`. Evaluation never returns an error; failures
//! degrade to a Prompt result carrying the error text, surfaced through an
//! error event. Structural CRUD errors (unknown ids, built-in mutation)
//! do bubble to the caller.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::audit::{
    compute_statistics, export_entries, suggested_rules, AuditFilter, AuditLog, ExportFormat,
    PermissionAuditEntry, PermissionStatistics, TimeRange,
};
use crate::cache::{spawn_sweeper, DecisionCache, SweeperHandle};
use crate::core::clock::{Clock, SystemClock};
use crate::core::context::PermissionContext;
use crate::core::error::{EngineError, EngineResult};
use crate::core::ids::{IdGenerator, UuidIdGenerator};
use crate::core::types::PermissionDecision;
use crate::events::{EngineEvent, EventBus, SubscriptionId};
use crate::profiles::{
    ensure_built_in_profiles, PermissionProfile, ProfileDraft, ProfileStore, ProfileUpdate,
};
use crate::rules::{
    file_extension, find_matching_rule, validate_rule, ConditionEnv, FileSystemProbe,
    PermissionResult, PermissionRule, RuleCondition, WorkspaceProbe,
};
use crate::storage::{KeyValueStore, MemoryStore};

use super::config::EngineConfig;
use super::state::{PersistedState, STATE_KEY};

/// Per-call evaluation options
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Evaluate against this profile instead of the active one
    pub profile_id: Option<String>,
    /// Consult and populate the decision cache
    pub use_cache: bool,
    /// Write an audit entry for this evaluation
    pub enable_audit_log: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            profile_id: None,
            use_cache: true,
            enable_audit_log: true,
        }
    }
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn without_audit(mut self) -> Self {
        self.enable_audit_log = false;
        self
    }
}

/// How far a manual approval or denial should generalize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RememberDecision {
    /// Apply to this request only
    Once,
    /// Materialize a rule for the resource's file extension
    ForExtension,
    /// Materialize a rule for this exact path
    ForPath,
}

/// Priority given to rules materialized from manual decisions
const MANUAL_RULE_PRIORITY: u32 = 50;

/// Builder for `PermissionEngine`
pub struct PermissionEngineBuilder {
    storage: Arc<dyn KeyValueStore>,
    config: EngineConfig,
    config_overridden: bool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    fs: Option<Arc<dyn FileSystemProbe>>,
    workspace: Option<Arc<dyn WorkspaceProbe>>,
    start_sweeper: bool,
}

impl PermissionEngineBuilder {
    fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStore::new()),
            config: EngineConfig::default(),
            config_overridden: false,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIdGenerator),
            fs: None,
            workspace: None,
            start_sweeper: true,
        }
    }

    /// Persistence collaborator; defaults to an in-memory store
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = storage;
        self
    }

    /// Explicit configuration; wins over any persisted configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self.config_overridden = true;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_fs_probe(mut self, fs: Arc<dyn FileSystemProbe>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn with_workspace_probe(mut self, workspace: Arc<dyn WorkspaceProbe>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Skip the background cache sweep; the host schedules
    /// `DecisionCache::sweep_expired` itself
    pub fn without_sweeper(mut self) -> Self {
        self.start_sweeper = false;
        self
    }

    /// Load persisted state, seed built-in profiles and start the sweeper
    pub async fn build(self) -> EngineResult<PermissionEngine> {
        let events = Arc::new(EventBus::new());
        let store = ProfileStore::new(events.clone(), self.clock.clone(), self.ids.clone());

        let mut config = self.config;
        let mut restored_audit = Vec::new();
        if let Some(value) = self.storage.get(STATE_KEY).await? {
            match serde_json::from_value::<PersistedState>(value) {
                Ok(state) => {
                    if !self.config_overridden {
                        config = state.configuration;
                    }
                    restored_audit = state.audit_log;
                    let profiles = state.profiles.into_iter().map(|(_, p)| p).collect();
                    store.restore(profiles, state.active_profile_id).await;
                    tracing::info!("restored persisted permission state");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "persisted state unreadable, starting fresh");
                }
            }
        }

        ensure_built_in_profiles(&store).await?;

        let audit = Arc::new(AuditLog::new(config.max_audit_entries));
        audit.restore(restored_audit).await;

        let cache = Arc::new(DecisionCache::new());
        let sweeper = if self.start_sweeper {
            Some(spawn_sweeper(
                cache.clone(),
                Duration::from_millis(config.cache_sweep_interval_ms),
            ))
        } else {
            None
        };

        let engine = PermissionEngine {
            config: RwLock::new(config),
            store,
            cache,
            audit,
            events,
            storage: self.storage,
            clock: self.clock,
            ids: self.ids,
            fs: self.fs,
            workspace: self.workspace,
            sweeper: std::sync::Mutex::new(sweeper),
        };
        engine.persist().await?;
        Ok(engine)
    }
}

/// The permission policy engine
pub struct PermissionEngine {
    config: RwLock<EngineConfig>,
    store: ProfileStore,
    cache: Arc<DecisionCache>,
    audit: Arc<AuditLog>,
    events: Arc<EventBus>,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    fs: Option<Arc<dyn FileSystemProbe>>,
    workspace: Option<Arc<dyn WorkspaceProbe>>,
    sweeper: std::sync::Mutex<Option<SweeperHandle>>,
}

impl PermissionEngine {
    pub fn builder() -> PermissionEngineBuilder {
        PermissionEngineBuilder::new()
    }

    // --- Evaluation ---

    /// Decide whether the requested operation should be allowed, denied or
    /// escalated to the user
    ///
    /// Never fails: any internal error degrades the decision to Prompt
    /// with the error text as the reason.
    pub async fn evaluate_permission(
        &self,
        context: &PermissionContext,
        options: &EvaluationOptions,
    ) -> PermissionResult {
        let started = Instant::now();
        let config = self.config.read().await.clone();

        if !config.enabled {
            let result = PermissionResult::prompt("Permission engine is disabled")
                .with_evaluation_time(elapsed_ms(started));
            self.emit_decision(context, &result);
            return result;
        }

        let cache_key = context.cache_key();
        if options.use_cache && config.cache_enabled {
            if let Some(hit) = self.cache.get(&cache_key).await {
                tracing::debug!(key = %cache_key, "decision cache hit");
                return hit;
            }
        }

        let mut result = match self.evaluate_against_profile(context, options, &config).await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, uri = %context.uri, "evaluation failed, degrading to prompt");
                self.events.emit(&EngineEvent::Error {
                    message: err.to_string(),
                    context: Some(context.clone()),
                });
                PermissionResult::prompt(format!("Evaluation failed: {err}"))
            }
        };
        result.evaluation_time_ms = elapsed_ms(started);

        if result.cacheable {
            if result.cache_timeout.is_none() {
                result.cache_timeout = Some(config.cache_ttl_ms);
            }
            if config.cache_enabled {
                let ttl = Duration::from_millis(result.cache_timeout.unwrap_or(config.cache_ttl_ms));
                self.cache.insert(cache_key, result.clone(), ttl).await;
            }
        }

        if options.enable_audit_log && config.audit_enabled {
            let entry = PermissionAuditEntry::new(
                self.ids.generate(),
                context.clone(),
                result.clone(),
                true,
            );
            self.audit.append(entry).await;
        }

        self.emit_decision(context, &result);
        result
    }

    /// Whether evaluation would auto-approve, without touching the audit log
    pub async fn would_auto_approve(&self, context: &PermissionContext) -> bool {
        let options = EvaluationOptions::new().without_audit();
        self.evaluate_permission(context, &options)
            .await
            .is_allowed()
    }

    /// Record a user's approval, optionally materializing a rule
    pub async fn manually_approve(
        &self,
        context: &PermissionContext,
        remember: RememberDecision,
    ) -> EngineResult<PermissionResult> {
        self.manual_decision(context, PermissionDecision::Allow, true, remember)
            .await
    }

    /// Record a user's denial, optionally materializing a rule
    pub async fn manually_deny(
        &self,
        context: &PermissionContext,
        remember: RememberDecision,
    ) -> EngineResult<PermissionResult> {
        self.manual_decision(context, PermissionDecision::Deny, false, remember)
            .await
    }

    async fn manual_decision(
        &self,
        context: &PermissionContext,
        decision: PermissionDecision,
        executed: bool,
        remember: RememberDecision,
    ) -> EngineResult<PermissionResult> {
        let reason = match decision {
            PermissionDecision::Allow => "Manually approved by user",
            _ => "Manually denied by user",
        };
        let result = PermissionResult::manual(decision, reason);

        let entry = PermissionAuditEntry::new(
            self.ids.generate(),
            context.clone(),
            result.clone(),
            executed,
        );
        self.audit.append(entry).await;

        if remember != RememberDecision::Once {
            self.materialize_manual_rule(context, decision, remember)
                .await?;
        }

        self.persist().await?;
        self.emit_decision(context, &result);
        Ok(result)
    }

    async fn materialize_manual_rule(
        &self,
        context: &PermissionContext,
        decision: PermissionDecision,
        remember: RememberDecision,
    ) -> EngineResult<()> {
        let Some(active) = self.store.active_profile().await else {
            tracing::warn!("no active profile, manual decision not remembered");
            return Ok(());
        };
        if active.is_built_in {
            tracing::warn!(
                profile = %active.name,
                "active profile is built-in, manual decision not remembered"
            );
            return Ok(());
        }

        let verb = if decision == PermissionDecision::Allow {
            "approved"
        } else {
            "denied"
        };
        let (name, condition) = match remember {
            RememberDecision::ForExtension => {
                let extension = file_extension(&context.uri);
                if extension.is_empty() {
                    // No extension to generalize on; pin the exact path
                    (
                        format!("User {verb} {} of {}", context.operation, context.uri),
                        RuleCondition::path_equals(&context.uri),
                    )
                } else {
                    (
                        format!("User {verb} {} of .{extension} files", context.operation),
                        RuleCondition::extension_in([extension]),
                    )
                }
            }
            RememberDecision::ForPath | RememberDecision::Once => (
                format!("User {verb} {} of {}", context.operation, context.uri),
                RuleCondition::path_equals(&context.uri),
            ),
        };

        let now = self.clock.now();
        let mut rule = PermissionRule::new(name, context.operation, context.scope, decision)
            .with_description(format!("Remembered from a manual decision on {}", context.uri))
            .with_condition(condition)
            .with_priority(MANUAL_RULE_PRIORITY);
        rule.id = self.ids.generate();
        rule.created_at = now;
        rule.modified_at = now;

        self.store.add_rule(&active.id, rule).await?;
        Ok(())
    }

    async fn evaluate_against_profile(
        &self,
        context: &PermissionContext,
        options: &EvaluationOptions,
        config: &EngineConfig,
    ) -> EngineResult<PermissionResult> {
        let profile = match &options.profile_id {
            Some(id) => self.store.get_profile(id).await,
            None => match self.store.active_profile().await {
                Some(profile) => Some(profile),
                None => match &config.default_profile {
                    Some(id) => self.store.get_profile(id).await,
                    None => None,
                },
            },
        };
        let Some(profile) = profile else {
            return Ok(PermissionResult::prompt("No active permission profile found"));
        };

        let mut env = ConditionEnv::at(self.clock.now()).with_activity(self.audit.as_ref());
        if let Some(fs) = self.fs.as_deref() {
            env = env.with_fs(fs);
        }
        if let Some(workspace) = self.workspace.as_deref() {
            env = env.with_workspace(workspace);
        }

        Ok(match find_matching_rule(&profile.rules, context, &env).await {
            Some(rule) => {
                tracing::debug!(rule = %rule.name, uri = %context.uri, "rule matched");
                PermissionResult::from_rule(rule)
            }
            None => PermissionResult::from_default(profile.default_decision, &profile.name),
        })
    }

    // --- Profile and rule management ---
    //
    // Thin wrappers over the store that persist after each mutation.

    pub async fn create_profile(&self, draft: ProfileDraft) -> EngineResult<String> {
        let id = self.store.create_profile(draft).await?;
        self.persist().await?;
        Ok(id)
    }

    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> EngineResult<()> {
        self.store.update_profile(id, update).await?;
        self.persist().await
    }

    pub async fn delete_profile(&self, id: &str) -> EngineResult<()> {
        self.store.delete_profile(id).await?;
        self.persist().await
    }

    pub async fn list_profiles(&self) -> Vec<PermissionProfile> {
        self.store.list_profiles().await
    }

    pub async fn get_profile(&self, id: &str) -> Option<PermissionProfile> {
        self.store.get_profile(id).await
    }

    pub async fn active_profile(&self) -> Option<PermissionProfile> {
        self.store.active_profile().await
    }

    pub async fn set_active_profile(&self, id: &str) -> EngineResult<()> {
        self.store.set_active_profile(id).await?;
        self.persist().await
    }

    pub async fn add_rule(&self, profile_id: &str, rule: PermissionRule) -> EngineResult<String> {
        let rule_id = self.store.add_rule(profile_id, rule).await?;
        self.persist().await?;
        Ok(rule_id)
    }

    pub async fn update_rule(&self, profile_id: &str, rule: PermissionRule) -> EngineResult<()> {
        self.store.update_rule(profile_id, rule).await?;
        self.persist().await
    }

    pub async fn delete_rule(&self, profile_id: &str, rule_id: &str) -> EngineResult<()> {
        self.store.delete_rule(profile_id, rule_id).await?;
        self.persist().await
    }

    // --- Audit surface ---

    pub async fn get_audit_log(
        &self,
        limit: Option<usize>,
        filter: &AuditFilter,
    ) -> Vec<PermissionAuditEntry> {
        self.audit.query(limit, filter).await
    }

    /// Remove all audit entries, or only those older than the cutoff
    pub async fn clear_audit_log(&self, older_than: Option<DateTime<Utc>>) -> EngineResult<usize> {
        let removed = self.audit.clear(older_than).await;
        self.persist().await?;
        Ok(removed)
    }

    pub async fn export_audit_log(&self, format: ExportFormat) -> EngineResult<String> {
        let entries = self.audit.snapshot().await;
        export_entries(&entries, format)
    }

    pub async fn get_statistics(&self, range: Option<TimeRange>) -> PermissionStatistics {
        let entries = self.audit.snapshot().await;
        compute_statistics(&entries, range)
    }

    /// Mine the audit log for candidate rules; nothing is persisted
    pub async fn get_suggested_rules(&self, lookback_days: i64) -> Vec<PermissionRule> {
        let entries = self.audit.snapshot().await;
        suggested_rules(&entries, lookback_days, self.clock.now(), self.ids.as_ref())
    }

    /// Validate and insert a mined candidate into a profile
    pub async fn adopt_suggested_rule(
        &self,
        profile_id: &str,
        rule: PermissionRule,
    ) -> EngineResult<String> {
        let validation = validate_rule(&rule);
        if !validation.valid {
            return Err(EngineError::InvalidConfig(validation.errors.join("; ")));
        }
        self.add_rule(profile_id, rule).await
    }

    // --- Cache and configuration ---

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn configuration(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration and persist it
    pub async fn update_configuration(&self, config: EngineConfig) -> EngineResult<()> {
        self.audit.set_capacity(config.max_audit_entries).await;
        if !config.cache_enabled {
            self.cache.clear().await;
        }
        *self.config.write().await = config;
        self.persist().await
    }

    // --- Events ---

    /// Subscribe to profile-change, decision and error events
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // --- Lifecycle ---

    /// Stop the background sweeper and write a final state snapshot
    pub async fn dispose(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.cancel();
        }
        if let Err(err) = self.persist().await {
            tracing::error!(error = %err, "failed to persist state on dispose");
            self.events.emit(&EngineEvent::Error {
                message: err.to_string(),
                context: None,
            });
        }
    }

    async fn persist(&self) -> EngineResult<()> {
        let profiles = self.store.list_profiles().await;
        let state = PersistedState {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
            active_profile_id: self.store.active_profile_id().await,
            audit_log: self.audit.snapshot().await,
            configuration: self.config.read().await.clone(),
        };
        let value = serde_json::to_value(&state)?;
        self.storage.update(STATE_KEY, value).await
    }

    fn emit_decision(&self, context: &PermissionContext, result: &PermissionResult) {
        self.events.emit(&EngineEvent::Decision {
            context: context.clone(),
            result: result.clone(),
        });
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine").finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OperationKind, ResourceScope};

    fn read_txt_context() -> PermissionContext {
        PermissionContext::new("/a.txt", OperationKind::Read, ResourceScope::File, "reader")
    }

    #[tokio::test]
    async fn test_disabled_engine_prompts() {
        let engine = PermissionEngine::builder()
            .with_config(EngineConfig::new().with_enabled(false))
            .build()
            .await
            .unwrap();

        let result = engine
            .evaluate_permission(&read_txt_context(), &EvaluationOptions::new())
            .await;
        assert_eq!(result.decision, PermissionDecision::Prompt);
        assert!(result.reason.contains("disabled"));

        // Disabled evaluations are not audited
        assert!(engine.get_audit_log(None, &AuditFilter::new()).await.is_empty());
        engine.dispose().await;
    }

    #[tokio::test]
    async fn test_unknown_profile_option_prompts() {
        let engine = PermissionEngine::builder().build().await.unwrap();

        let options = EvaluationOptions::new().with_profile_id("no-such-profile");
        let result = engine
            .evaluate_permission(&read_txt_context(), &options)
            .await;

        assert_eq!(result.decision, PermissionDecision::Prompt);
        assert!(result.reason.contains("No active permission profile found"));
        engine.dispose().await;
    }

    #[tokio::test]
    async fn test_would_auto_approve_leaves_no_audit_trail() {
        let engine = PermissionEngine::builder().build().await.unwrap();

        assert!(engine.would_auto_approve(&read_txt_context()).await);
        assert!(engine.get_audit_log(None, &AuditFilter::new()).await.is_empty());
        engine.dispose().await;
    }
}
