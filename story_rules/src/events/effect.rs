//! Narrative effects applied when an event or choice resolves.

use serde::{Deserialize, Serialize};

use crate::conditions::FlagValue;

/// A state change requested by the story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Effect {
    SetFlag {
        name: String,
        value: FlagValue,
    },

    #[serde(rename_all = "camelCase")]
    UnlockPower {
        power_id: String,
    },

    SetCheckpoint {
        name: String,
    },
}

impl Effect {
    pub fn set_flag(name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Effect::SetFlag {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn unlock_power(power_id: impl Into<String>) -> Self {
        Effect::UnlockPower {
            power_id: power_id.into(),
        }
    }

    pub fn set_checkpoint(name: impl Into<String>) -> Self {
        Effect::SetCheckpoint { name: name.into() }
    }
}
