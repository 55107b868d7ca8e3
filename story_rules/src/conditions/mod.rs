//! Guard conditions and the flag values they test.

use serde::{Deserialize, Serialize};

/// Flag value types for narrative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FlagValue {
    /// Truthiness used when a flag is read as a switch.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Float(f) => *f != 0.0,
            FlagValue::String(s) => !s.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        FlagValue::Float(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::String(value)
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Float(x) => write!(f, "{}", x),
            FlagValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

fn default_expected() -> FlagValue {
    FlagValue::Bool(true)
}

/// A single guard tested against live session state.
///
/// Any `kind` this build does not recognise deserializes into
/// [`Condition::Unknown`], which never holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Condition {
    /// Equality test against a story flag. Unset flags never match.
    Flag {
        name: String,
        #[serde(default = "default_expected")]
        expected: FlagValue,
    },

    /// Membership test against the unlocked powers.
    #[serde(rename_all = "camelCase")]
    PowerUnlocked { power_id: String },

    /// Membership test against the completed events.
    #[serde(rename_all = "camelCase")]
    EventCompleted { event_id: String },

    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Create a flag equality condition.
    pub fn flag(name: impl Into<String>, expected: impl Into<FlagValue>) -> Self {
        Condition::Flag {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Create a power-unlocked condition.
    pub fn power_unlocked(power_id: impl Into<String>) -> Self {
        Condition::PowerUnlocked {
            power_id: power_id.into(),
        }
    }

    /// Create an event-completed condition.
    pub fn event_completed(event_id: impl Into<String>) -> Self {
        Condition::EventCompleted {
            event_id: event_id.into(),
        }
    }

    /// Evaluate this condition. Unknown kinds are unsatisfied.
    pub fn evaluate(&self, ctx: &dyn ConditionContext) -> bool {
        match self {
            Condition::Flag { name, expected } => ctx.flag(name) == Some(expected),
            Condition::PowerUnlocked { power_id } => ctx.is_power_unlocked(power_id),
            Condition::EventCompleted { event_id } => ctx.is_event_completed(event_id),
            Condition::Unknown => {
                tracing::warn!("unrecognized condition kind evaluated as unsatisfied");
                false
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Flag { .. } => "flag",
            Condition::PowerUnlocked { .. } => "power-unlocked",
            Condition::EventCompleted { .. } => "event-completed",
            Condition::Unknown => "unknown",
        }
    }
}

/// Read access to the state conditions are evaluated against.
pub trait ConditionContext {
    fn flag(&self, name: &str) -> Option<&FlagValue>;

    fn is_power_unlocked(&self, power_id: &str) -> bool;

    fn is_event_completed(&self, event_id: &str) -> bool;
}

/// AND-reduction over a condition list. The empty list holds.
pub fn conditions_met(conditions: &[Condition], ctx: &dyn ConditionContext) -> bool {
    conditions.iter().all(|condition| condition.evaluate(ctx))
}
