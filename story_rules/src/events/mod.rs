//! Story event definitions - the nodes of the event graph.

mod effect;

pub use effect::*;

use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// Event type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Dialogue,
    FlagEffect,
    Unlock,
    Branch,
}

/// A selectable option on a branching event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_event: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Choice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next_event: None,
            effects: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_next(mut self, event_id: impl Into<String>) -> Self {
        self.next_event = Some(event_id.into());
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Type-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

/// A node in the story graph. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default)]
    pub content: EventContent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_event: Option<String>,

    /// Guards that must hold before the event resolves at all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,

    /// One-shot events apply their effects only the first time.
    #[serde(default)]
    pub once: bool,
}

impl StoryEvent {
    /// Create an event with empty content.
    pub fn new(id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: id.into(),
            kind,
            content: EventContent::default(),
            next_event: None,
            conditions: Vec::new(),
            effects: Vec::new(),
            once: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.text = Some(text.into());
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.content.speaker = Some(speaker.into());
        self
    }

    pub fn with_next(mut self, event_id: impl Into<String>) -> Self {
        self.next_event = Some(event_id.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.content.choices.push(choice);
        self
    }

    /// Mark the event as one-shot.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Whether resolution waits for a choice selection.
    pub fn is_branching(&self) -> bool {
        !self.content.choices.is_empty()
    }

    /// Every event id this event can lead to.
    pub fn outgoing_edges(&self) -> impl Iterator<Item = &str> {
        self.next_event.as_deref().into_iter().chain(
            self.content
                .choices
                .iter()
                .filter_map(|choice| choice.next_event.as_deref()),
        )
    }

    /// Every effect declared on the event or any of its choices.
    pub fn all_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .chain(self.content.choices.iter().flat_map(|c| c.effects.iter()))
    }
}
