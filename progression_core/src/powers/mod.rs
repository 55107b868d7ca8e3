//! Power system - unlocking, availability and the cooldown state machine.
//!
//! Each power moves Locked → Ready → Active (timed powers only) → Cooldown →
//! Ready. Cooldown is measured from activation start, so a timed power's
//! active window runs inside its cooldown.

mod registry;

pub use registry::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use story_rules::{conditions_met, ConditionContext, PowerDefinition};
use thiserror::Error;

use crate::clock::Clock;

/// Why an activation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    #[error("unknown power '{0}'")]
    Unknown(String),

    #[error("power '{0}' is locked")]
    Locked(String),

    #[error("power '{power_id}' is cooling down ({remaining_ms} ms left)")]
    Cooldown { power_id: String, remaining_ms: u64 },

    #[error("unlock conditions for '{0}' no longer hold")]
    ConditionsUnmet(String),
}

impl ActivationError {
    /// Short reason code for the presentation layer.
    pub fn reason(&self) -> &'static str {
        match self {
            ActivationError::Unknown(_) => "unknown",
            ActivationError::Locked(_) => "locked",
            ActivationError::Cooldown { .. } => "cooldown",
            ActivationError::ConditionsUnmet(_) => "conditions",
        }
    }
}

/// A successful activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerActivation {
    pub power_id: String,
    pub activated_at: u64,
    pub active_until: Option<u64>,
    /// Activation fields merged with the caller's context.
    pub context: Map<String, Value>,
}

/// Externally visible state of one power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Locked,
    Ready,
    Active { remaining_ms: u64 },
    Cooldown { remaining_ms: u64 },
}

/// Called with every successful activation of a power naming the hook.
pub type EffectHook = Box<dyn FnMut(&PowerActivation)>;

/// Operations over the power registry.
pub struct PowerSystem {
    registry: PowerRegistry,
    clock: Arc<dyn Clock>,
    hooks: HashMap<String, EffectHook>,
    recheck_unlock_conditions: bool,
}

impl PowerSystem {
    pub fn new(definitions: Vec<PowerDefinition>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: PowerRegistry::new(definitions),
            clock,
            hooks: HashMap::new(),
            recheck_unlock_conditions: false,
        }
    }

    pub fn with_recheck(mut self, recheck: bool) -> Self {
        self.recheck_unlock_conditions = recheck;
        self
    }

    /// Replace the catalog. All runtime state starts locked again.
    pub fn install_catalog(&mut self, definitions: Vec<PowerDefinition>) {
        self.registry = PowerRegistry::new(definitions);
    }

    pub fn registry(&self) -> &PowerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PowerRegistry {
        &mut self.registry
    }

    pub fn rechecks_unlock_conditions(&self) -> bool {
        self.recheck_unlock_conditions
    }

    /// Register the closure run for a hook name.
    pub fn register_effect(&mut self, hook: impl Into<String>, effect: EffectHook) {
        self.hooks.insert(hook.into(), effect);
    }

    pub fn get_power_list(&self) -> &[PowerDefinition] {
        self.registry.definitions()
    }

    pub fn get_unlocked_power_list(&self) -> Vec<&PowerDefinition> {
        self.registry
            .definitions()
            .iter()
            .filter(|d| self.registry.is_unlocked(&d.id))
            .collect()
    }

    /// Unlock explicitly. `None` for unknown ids.
    pub fn unlock_power(&mut self, id: &str, source: &str) -> Option<bool> {
        let changed = self.registry.unlock(id, source)?;
        if changed {
            tracing::info!(power_id = id, source, "power unlocked");
        }
        Some(changed)
    }

    /// Locked powers whose declared unlock conditions now hold.
    pub fn pending_unlocks(&self, ctx: &dyn ConditionContext) -> Vec<String> {
        self.registry
            .definitions()
            .iter()
            .filter(|d| !self.registry.is_unlocked(&d.id))
            .filter(|d| !d.unlock_conditions.is_empty())
            .filter(|d| conditions_met(&d.unlock_conditions, ctx))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Whether a power's unlock conditions hold right now. Unknown ids never do.
    pub fn unlock_conditions_hold(&self, id: &str, ctx: &dyn ConditionContext) -> bool {
        self.registry
            .definition(id)
            .map(|d| conditions_met(&d.unlock_conditions, ctx))
            .unwrap_or(false)
    }

    pub fn get_remaining_cooldown(&self, id: &str) -> u64 {
        let now = self.clock.now_ms();
        match (self.registry.definition(id), self.registry.runtime(id)) {
            (Some(definition), Some(state)) => state.remaining_cooldown(definition.cooldown_ms, now),
            _ => 0,
        }
    }

    pub fn is_power_active(&self, id: &str) -> bool {
        let now = self.clock.now_ms();
        self.registry
            .runtime(id)
            .map(|s| s.is_active(now))
            .unwrap_or(false)
    }

    /// Unlocked, off cooldown and, when rechecking, unlock conditions still hold.
    pub fn check_power_availability(&self, id: &str, ctx: &dyn ConditionContext) -> bool {
        if !self.registry.is_unlocked(id) || self.get_remaining_cooldown(id) > 0 {
            return false;
        }
        !self.recheck_unlock_conditions || self.unlock_conditions_hold(id, ctx)
    }

    pub fn power_state(&self, id: &str) -> Option<PowerState> {
        let definition = self.registry.definition(id)?;
        let state = self.registry.runtime(id)?;
        let now = self.clock.now_ms();

        if !state.unlocked {
            return Some(PowerState::Locked);
        }
        if let Some(until) = state.active_until.filter(|until| *until > now) {
            return Some(PowerState::Active {
                remaining_ms: until - now,
            });
        }
        match state.remaining_cooldown(definition.cooldown_ms, now) {
            0 => Some(PowerState::Ready),
            remaining_ms => Some(PowerState::Cooldown { remaining_ms }),
        }
    }

    /// Activate a power. Refusals leave all state untouched.
    ///
    /// `context` fields are merged into the activation context; the
    /// `powerId`, `activatedAt` and `activeUntil` fields always reflect the
    /// activation itself. A non-object context is stored under `payload`.
    pub fn activate_power(
        &mut self,
        id: &str,
        context: Value,
    ) -> Result<PowerActivation, ActivationError> {
        let now = self.clock.now_ms();
        let definition = self
            .registry
            .definition(id)
            .ok_or_else(|| ActivationError::Unknown(id.to_string()))?;
        let cooldown_ms = definition.cooldown_ms;
        let duration_ms = definition.active_duration_ms;
        let hook = definition.effect.clone();

        let state = self
            .registry
            .runtime_mut(id)
            .ok_or_else(|| ActivationError::Unknown(id.to_string()))?;
        if !state.unlocked {
            return Err(ActivationError::Locked(id.to_string()));
        }
        let remaining_ms = state.remaining_cooldown(cooldown_ms, now);
        if remaining_ms > 0 {
            return Err(ActivationError::Cooldown {
                power_id: id.to_string(),
                remaining_ms,
            });
        }

        state.last_activated_at = Some(now);
        state.active_until = (duration_ms > 0).then(|| now.saturating_add(duration_ms));

        let mut merged = match context {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                let mut fields = Map::new();
                fields.insert("payload".to_string(), other);
                fields
            }
        };
        merged.insert("powerId".to_string(), Value::from(id));
        merged.insert("activatedAt".to_string(), Value::from(now));
        merged.insert(
            "activeUntil".to_string(),
            state.active_until.map(Value::from).unwrap_or(Value::Null),
        );

        let activation = PowerActivation {
            power_id: id.to_string(),
            activated_at: now,
            active_until: state.active_until,
            context: merged,
        };

        tracing::debug!(power_id = id, at = now, "power activated");

        if let Some(hook) = hook {
            match self.hooks.get_mut(&hook) {
                Some(effect) => effect(&activation),
                None => tracing::debug!(power_id = id, hook = %hook, "no effect registered"),
            }
        }

        Ok(activation)
    }
}

impl std::fmt::Debug for PowerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerSystem")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("recheck_unlock_conditions", &self.recheck_unlock_conditions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use story_rules::{Condition, FlagValue};

    struct NoState;

    impl ConditionContext for NoState {
        fn flag(&self, _name: &str) -> Option<&FlagValue> {
            None
        }

        fn is_power_unlocked(&self, _power_id: &str) -> bool {
            false
        }

        fn is_event_completed(&self, _event_id: &str) -> bool {
            false
        }
    }

    fn setup() -> (PowerSystem, ManualClock) {
        let clock = ManualClock::new(10_000);
        let system = PowerSystem::new(
            vec![
                PowerDefinition::new("telekinesis", 3_000).with_effect("push"),
                PowerDefinition::new("time_slow", 15_000)
                    .with_active_duration(5_000)
                    .with_unlock_condition(Condition::flag("first_trial_cleared", true)),
            ],
            Arc::new(clock.clone()),
        );
        (system, clock)
    }

    #[test]
    fn test_locked_activation_fails() {
        let (mut powers, _) = setup();

        let err = powers.activate_power("telekinesis", json!({})).unwrap_err();
        assert_eq!(err.reason(), "locked");
        assert!(powers
            .registry()
            .runtime("telekinesis")
            .unwrap()
            .last_activated_at
            .is_none());
    }

    #[test]
    fn test_unknown_power() {
        let (mut powers, _) = setup();

        assert_eq!(
            powers.activate_power("flight", Value::Null),
            Err(ActivationError::Unknown("flight".to_string()))
        );
        assert!(!powers.check_power_availability("flight", &NoState));
        assert_eq!(powers.get_remaining_cooldown("flight"), 0);
        assert!(powers.power_state("flight").is_none());
    }

    #[test]
    fn test_cooldown_cycle() {
        let (mut powers, clock) = setup();
        powers.unlock_power("telekinesis", "test");
        assert!(powers.check_power_availability("telekinesis", &NoState));

        powers.activate_power("telekinesis", json!({"target": "crate"})).unwrap();
        assert_eq!(powers.get_remaining_cooldown("telekinesis"), 3_000);
        assert!(!powers.check_power_availability("telekinesis", &NoState));

        match powers.activate_power("telekinesis", Value::Null) {
            Err(ActivationError::Cooldown { remaining_ms, .. }) => assert_eq!(remaining_ms, 3_000),
            other => panic!("expected cooldown, got {:?}", other),
        }

        clock.advance(1_000);
        assert_eq!(
            powers.power_state("telekinesis"),
            Some(PowerState::Cooldown { remaining_ms: 2_000 })
        );

        clock.advance(2_000);
        assert_eq!(powers.get_remaining_cooldown("telekinesis"), 0);
        assert_eq!(powers.power_state("telekinesis"), Some(PowerState::Ready));
    }

    #[test]
    fn test_timed_power_active_window() {
        let (mut powers, clock) = setup();
        powers.unlock_power("time_slow", "test");

        let activation = powers.activate_power("time_slow", Value::Null).unwrap();
        assert_eq!(activation.active_until, Some(15_000));
        assert!(powers.is_power_active("time_slow"));
        assert_eq!(
            powers.power_state("time_slow"),
            Some(PowerState::Active { remaining_ms: 5_000 })
        );

        clock.advance(5_000);
        assert!(!powers.is_power_active("time_slow"));
        assert_eq!(
            powers.power_state("time_slow"),
            Some(PowerState::Cooldown { remaining_ms: 10_000 })
        );
    }

    #[test]
    fn test_effect_hook_receives_merged_context() {
        let (mut powers, _) = setup();
        let seen: Rc<RefCell<Vec<PowerActivation>>> = Rc::default();
        let sink = Rc::clone(&seen);
        powers.register_effect("push", Box::new(move |a: &PowerActivation| {
            sink.borrow_mut().push(a.clone())
        }));
        powers.unlock_power("telekinesis", "test");

        powers
            .activate_power("telekinesis", json!({"test": true, "powerId": "spoofed"}))
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].context["test"], json!(true));
        assert_eq!(seen[0].context["powerId"], json!("telekinesis"));
        assert_eq!(seen[0].context["activatedAt"], json!(10_000));
    }

    #[test]
    fn test_pending_unlocks_skip_unconditioned_powers() {
        struct Cleared(FlagValue);

        impl ConditionContext for Cleared {
            fn flag(&self, name: &str) -> Option<&FlagValue> {
                (name == "first_trial_cleared").then_some(&self.0)
            }

            fn is_power_unlocked(&self, _power_id: &str) -> bool {
                false
            }

            fn is_event_completed(&self, _event_id: &str) -> bool {
                false
            }
        }

        let (powers, _) = setup();
        assert!(powers.pending_unlocks(&NoState).is_empty());
        assert_eq!(
            powers.pending_unlocks(&Cleared(FlagValue::Bool(true))),
            vec!["time_slow".to_string()]
        );
    }

    #[test]
    fn test_recheck_unlock_conditions() {
        let (powers, _) = setup();
        let mut powers = powers.with_recheck(true);
        powers.unlock_power("time_slow", "debug");

        assert!(!powers.check_power_availability("time_slow", &NoState));
    }
}
