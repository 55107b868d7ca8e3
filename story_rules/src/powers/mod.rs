//! Power catalog definitions.

use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// A gated capability. Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerDefinition {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Minimum time between activations, in milliseconds.
    pub cooldown_ms: u64,

    /// 0 for instantaneous powers.
    #[serde(default)]
    pub active_duration_ms: u64,

    /// Conditions that unlock the power automatically. Empty means the
    /// power is only ever unlocked explicitly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlock_conditions: Vec<Condition>,

    /// Name of the effect hook invoked on activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl PowerDefinition {
    /// Create a new power definition.
    pub fn new(id: impl Into<String>, cooldown_ms: u64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            cooldown_ms,
            active_duration_ms: 0,
            unlock_conditions: Vec::new(),
            effect: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_active_duration(mut self, duration_ms: u64) -> Self {
        self.active_duration_ms = duration_ms;
        self
    }

    pub fn with_unlock_condition(mut self, condition: Condition) -> Self {
        self.unlock_conditions.push(condition);
        self
    }

    pub fn with_effect(mut self, hook: impl Into<String>) -> Self {
        self.effect = Some(hook.into());
        self
    }

    pub fn is_instantaneous(&self) -> bool {
        self.active_duration_ms == 0
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
