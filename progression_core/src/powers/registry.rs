//! Power registry - catalog definitions plus per-power runtime state.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use story_rules::PowerDefinition;

/// Mutable state for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerRuntimeState {
    pub unlocked: bool,
    pub last_activated_at: Option<u64>,
    pub active_until: Option<u64>,
    /// What unlocked the power, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_source: Option<String>,
}

impl PowerRuntimeState {
    /// Cooldown left at `now`, measured from activation start.
    pub fn remaining_cooldown(&self, cooldown_ms: u64, now: u64) -> u64 {
        match self.last_activated_at {
            Some(at) => cooldown_ms.saturating_sub(now.saturating_sub(at)),
            None => 0,
        }
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.active_until.map(|until| until > now).unwrap_or(false)
    }
}

/// Catalog of power definitions with their runtime state.
#[derive(Debug, Clone, Default)]
pub struct PowerRegistry {
    definitions: Vec<PowerDefinition>,
    index: HashMap<String, usize>,
    runtime: HashMap<String, PowerRuntimeState>,
}

impl PowerRegistry {
    /// Build a registry. On duplicate ids the first definition is kept.
    pub fn new(definitions: Vec<PowerDefinition>) -> Self {
        let mut registry = Self::default();
        for definition in definitions {
            if registry.index.contains_key(&definition.id) {
                tracing::warn!(power_id = %definition.id, "duplicate power definition ignored");
                continue;
            }
            registry
                .index
                .insert(definition.id.clone(), registry.definitions.len());
            registry
                .runtime
                .insert(definition.id.clone(), PowerRuntimeState::default());
            registry.definitions.push(definition);
        }
        registry
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn definition(&self, id: &str) -> Option<&PowerDefinition> {
        self.index.get(id).map(|i| &self.definitions[*i])
    }

    /// All definitions in catalog order.
    pub fn definitions(&self) -> &[PowerDefinition] {
        &self.definitions
    }

    pub fn runtime(&self, id: &str) -> Option<&PowerRuntimeState> {
        self.runtime.get(id)
    }

    pub fn runtime_mut(&mut self, id: &str) -> Option<&mut PowerRuntimeState> {
        self.runtime.get_mut(id)
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.runtime.get(id).map(|s| s.unlocked).unwrap_or(false)
    }

    pub fn unlocked_ids(&self) -> HashSet<String> {
        self.runtime
            .iter()
            .filter(|(_, state)| state.unlocked)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Unlock a power. `None` for unknown ids, otherwise whether state changed.
    pub fn unlock(&mut self, id: &str, source: &str) -> Option<bool> {
        let state = self.runtime.get_mut(id)?;
        if state.unlocked {
            return Some(false);
        }
        state.unlocked = true;
        state.unlock_source = Some(source.to_string());
        Some(true)
    }

    /// Owned copy of every runtime state.
    pub fn runtime_snapshot(&self) -> HashMap<String, PowerRuntimeState> {
        self.runtime.clone()
    }

    /// Build a complete runtime map from saved state without touching live
    /// state. Unknown ids are dropped; missing ids start locked; activation
    /// windows are clamped to the definition's duration.
    pub fn prepare_restore(
        &self,
        saved: &HashMap<String, PowerRuntimeState>,
        unlocked: &HashSet<String>,
    ) -> HashMap<String, PowerRuntimeState> {
        for id in saved.keys().chain(unlocked.iter()) {
            if !self.contains(id) {
                tracing::warn!(power_id = %id, "saved power not in catalog, dropped");
            }
        }

        self.definitions
            .iter()
            .map(|definition| {
                let mut state = saved.get(&definition.id).cloned().unwrap_or_default();
                if unlocked.contains(&definition.id) {
                    state.unlocked = true;
                }
                state.active_until = match (state.last_activated_at, state.active_until) {
                    (Some(at), Some(until)) if definition.active_duration_ms > 0 => {
                        Some(until.min(at.saturating_add(definition.active_duration_ms)))
                    }
                    _ => None,
                };
                (definition.id.clone(), state)
            })
            .collect()
    }

    /// Swap in a runtime map produced by [`prepare_restore`](Self::prepare_restore).
    pub fn commit_restore(&mut self, runtime: HashMap<String, PowerRuntimeState>) {
        self.runtime = runtime;
    }
}
