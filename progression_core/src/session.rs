//! Game session - the single owner of all progression state.

use serde_json::Value;
use std::sync::Arc;
use story_rules::{Condition, DataOrigin, DataSource, FlagValue, PowerDefinition, StoryData};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, SessionConfig};
use crate::persistence::{
    manual_slot_key, DirectoryStore, MemoryStore, PersistError, PersistenceManager,
    PersistenceStatus, SaveKind, SaveSlotInfo, SaveStore, Snapshot, StoreError,
};
use crate::powers::{
    ActivationError, EffectHook, PowerActivation, PowerRuntimeState, PowerState, PowerSystem,
};
use crate::story::{
    ChoiceOutcome, StoryContext, StoryError, StoryProgress, StoryState, StorySystem,
    TriggerOutcome,
};

/// Errors from building a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("save storage error: {0}")]
    Store(#[from] StoreError),
}

/// What a successful load restored.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGame {
    pub slot: SaveSlotInfo,
    /// The caller payload stored with the save.
    pub extra: Value,
}

/// Session-scoped context owning the story, power and persistence systems.
pub struct GameSession {
    id: Uuid,
    story: StorySystem,
    powers: PowerSystem,
    persistence: PersistenceManager,
    extra: Value,
}

impl GameSession {
    /// Build a session from configuration: wall clock, story data from
    /// `story_data` (embedded fallback otherwise), directory storage when
    /// `save_dir` is set.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let store: Box<dyn SaveStore> = match &config.save_dir {
            Some(dir) => Box::new(DirectoryStore::open(dir)?),
            None => Box::new(MemoryStore::new()),
        };
        let source = match &config.story_data {
            Some(path) => DataSource::Path(path.clone()),
            None => DataSource::Embedded,
        };
        Ok(Self::with_parts(
            &config,
            &source,
            store,
            Arc::new(SystemClock),
        ))
    }

    /// Build a session from configuration stored in a TOML file.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self, SessionError> {
        Self::new(SessionConfig::from_file(path)?)
    }

    /// Build a session from explicit collaborators.
    pub fn with_parts(
        config: &SessionConfig,
        source: &DataSource,
        store: Box<dyn SaveStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (data, origin) = StoryData::load_or_fallback(source);
        let (story, catalog) = StorySystem::from_data(data, origin);
        let powers = PowerSystem::new(catalog, Arc::clone(&clock))
            .with_recheck(config.recheck_unlock_conditions);
        let persistence = PersistenceManager::new(store, clock, config);
        let id = Uuid::new_v4();
        tracing::info!(session_id = %id, ?origin, "game session started");

        Self {
            id,
            story,
            powers,
            persistence,
            extra: Value::Null,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn story(&self) -> &StorySystem {
        &self.story
    }

    pub fn powers(&self) -> &PowerSystem {
        &self.powers
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut PersistenceManager {
        &mut self.persistence
    }

    /// Reload story data. Story and power state start over.
    pub fn load_story_data(&mut self, source: &DataSource) -> DataOrigin {
        let (origin, catalog) = self.story.load_story_data(source);
        self.powers.install_catalog(catalog);
        origin
    }

    // Story

    pub fn trigger_story_event(&mut self, event_id: &str) -> Result<TriggerOutcome, StoryError> {
        let outcome = self.story.trigger_story_event(event_id, &mut self.powers)?;
        self.after_story_change();
        Ok(outcome)
    }

    pub fn select_choice(
        &mut self,
        event_id: &str,
        index: usize,
    ) -> Result<ChoiceOutcome, StoryError> {
        let outcome = self.story.select_choice(event_id, index, &mut self.powers)?;
        self.after_story_change();
        Ok(outcome)
    }

    pub fn set_story_flag(&mut self, name: impl Into<String>, value: impl Into<FlagValue>) {
        self.story.set_story_flag(name, value);
        self.after_story_change();
    }

    pub fn get_story_flag(&self, name: &str) -> Option<&FlagValue> {
        self.story.get_story_flag(name)
    }

    pub fn check_story_flag(&self, name: &str, expected: impl Into<FlagValue>) -> bool {
        self.story.check_story_flag(name, &expected.into())
    }

    pub fn check_story_conditions(&self, conditions: &[Condition]) -> bool {
        self.story
            .check_story_conditions(conditions, self.powers.registry())
    }

    /// Set the current checkpoint; the first visit per session autosaves.
    /// Returns true when an autosave was requested.
    pub fn set_checkpoint(&mut self, name: impl Into<String>) -> bool {
        let queued = self.story.set_checkpoint(name);
        self.after_story_change();
        queued
    }

    pub fn has_reached_checkpoint(&self, name: &str) -> bool {
        self.story.has_reached_checkpoint(name)
    }

    pub fn unlock_power(&mut self, power_id: &str, source: &str) -> Result<bool, StoryError> {
        let changed = self.story.unlock_power(power_id, source, &mut self.powers)?;
        self.after_story_change();
        Ok(changed)
    }

    pub fn get_story_state(&self) -> StoryState {
        self.story.get_story_state(self.powers.registry())
    }

    pub fn get_story_progress(&self) -> StoryProgress {
        self.story.get_story_progress()
    }

    // Powers

    pub fn get_power_list(&self) -> &[PowerDefinition] {
        self.powers.get_power_list()
    }

    pub fn get_unlocked_power_list(&self) -> Vec<&PowerDefinition> {
        self.powers.get_unlocked_power_list()
    }

    pub fn check_power_availability(&self, power_id: &str) -> bool {
        let ctx = StoryContext::new(&self.story, self.powers.registry());
        self.powers.check_power_availability(power_id, &ctx)
    }

    pub fn activate_power(
        &mut self,
        power_id: &str,
        context: Value,
    ) -> Result<PowerActivation, ActivationError> {
        if self.powers.rechecks_unlock_conditions() && self.powers.registry().is_unlocked(power_id) {
            let ctx = StoryContext::new(&self.story, self.powers.registry());
            if !self.powers.unlock_conditions_hold(power_id, &ctx) {
                return Err(ActivationError::ConditionsUnmet(power_id.to_string()));
            }
        }
        self.powers.activate_power(power_id, context)
    }

    pub fn is_power_active(&self, power_id: &str) -> bool {
        self.powers.is_power_active(power_id)
    }

    pub fn get_remaining_cooldown(&self, power_id: &str) -> u64 {
        self.powers.get_remaining_cooldown(power_id)
    }

    pub fn power_state(&self, power_id: &str) -> Option<PowerState> {
        self.powers.power_state(power_id)
    }

    pub fn power_runtime(&self, power_id: &str) -> Option<&PowerRuntimeState> {
        self.powers.registry().runtime(power_id)
    }

    pub fn register_power_effect(&mut self, hook: impl Into<String>, effect: EffectHook) {
        self.powers.register_effect(hook, effect);
    }

    /// Periodic update before rendering: unlock powers whose conditions now
    /// hold. Story mutations already do this, so a tick only catches state
    /// changed behind the session's back. Returns the newly unlocked ids.
    pub fn tick(&mut self) -> Vec<String> {
        self.refresh_unlocks()
    }

    fn refresh_unlocks(&mut self) -> Vec<String> {
        let mut unlocked = Vec::new();
        loop {
            let ctx = StoryContext::new(&self.story, self.powers.registry());
            let ready = self.powers.pending_unlocks(&ctx);
            if ready.is_empty() {
                return unlocked;
            }
            for id in ready {
                self.powers.unlock_power(&id, "unlock_conditions");
                unlocked.push(id);
            }
        }
    }

    fn after_story_change(&mut self) {
        self.refresh_unlocks();
        self.flush_autosaves();
    }

    // Persistence

    /// Extra caller payload stored with every save (player position and the like).
    pub fn set_extra_context(&mut self, extra: Value) {
        self.extra = extra;
    }

    pub fn extra_context(&self) -> &Value {
        &self.extra
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            story: self.get_story_state(),
            powers: self.powers.registry().runtime_snapshot(),
            extra: self.extra.clone(),
        }
    }

    fn flush_autosaves(&mut self) {
        for request in self.story.checkpoints_mut().drain_pending() {
            let snapshot = self.capture();
            if let Err(err) = self.persistence.auto_save(&request.checkpoint, snapshot) {
                tracing::warn!(checkpoint = %request.checkpoint, error = %err, "autosave failed");
            }
        }
    }

    pub fn manual_save(&mut self, slot_index: usize) -> Result<SaveSlotInfo, PersistError> {
        let snapshot = self.capture();
        self.persistence.manual_save(slot_index, snapshot)
    }

    pub fn get_available_saves(&self) -> Vec<SaveSlotInfo> {
        self.persistence.get_available_saves()
    }

    /// Load a save by key. On any failure live state is left as it was.
    pub fn load_game(&mut self, key: &str) -> Result<LoadedGame, PersistError> {
        let record = self.persistence.load_game(key)?;
        let runtime = self
            .powers
            .registry()
            .prepare_restore(&record.powers, &record.story.unlocked_powers);
        let slot = record.info();

        self.story.restore(record.story);
        self.powers.registry_mut().commit_restore(runtime);
        self.extra = record.extra.clone();

        Ok(LoadedGame {
            slot,
            extra: record.extra,
        })
    }

    /// Load the newest save of any kind.
    pub fn load_latest(&mut self) -> Result<Option<LoadedGame>, PersistError> {
        match self.get_available_saves().first() {
            Some(info) => {
                let key = info.key.clone();
                self.load_game(&key).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn delete_save(&mut self, key: &str) -> Result<bool, PersistError> {
        self.persistence.delete_save(key)
    }

    pub fn manual_slot_key(slot_index: usize) -> String {
        manual_slot_key(slot_index)
    }

    pub fn get_status(&self) -> PersistenceStatus {
        self.persistence.get_status()
    }

    pub fn is_auto_save_enabled(&self) -> bool {
        self.persistence.is_auto_save_enabled()
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.persistence.set_auto_save_enabled(enabled);
    }

    /// Number of auto saves currently on record.
    pub fn auto_save_count(&self) -> usize {
        self.get_available_saves()
            .iter()
            .filter(|info| info.kind == SaveKind::Auto)
            .count()
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("story", &self.story)
            .field("powers", &self.powers)
            .field("persistence", &self.persistence)
            .finish()
    }
}
