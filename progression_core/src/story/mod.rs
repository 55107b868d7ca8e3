//! Story system - event traversal, flags, checkpoints and power unlocks.

mod checkpoint;
mod flags;
mod graph;

pub use checkpoint::*;
pub use flags::*;
pub use graph::*;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use story_rules::{
    conditions_met, Choice, Condition, ConditionContext, DataOrigin, DataSource, Effect,
    FlagValue, PowerDefinition, StoryData, StoryEvent,
};
use thiserror::Error;

use crate::powers::{PowerRegistry, PowerSystem};

/// Errors from story operations. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryError {
    #[error("unknown story event '{0}'")]
    UnknownEvent(String),

    #[error("unknown power '{0}'")]
    UnknownPower(String),

    #[error("event '{0}' has no choices")]
    NotABranch(String),

    #[error("event '{event_id}' has no choice {index}")]
    InvalidChoice { event_id: String, index: usize },

    #[error("conditions for '{event_id}' choice {index} do not hold")]
    ChoiceBlocked { event_id: String, index: usize },
}

/// Serializable projection of narrative progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryState {
    pub current_checkpoint: Option<String>,
    pub completed_events: HashSet<String>,
    pub story_flags: HashMap<String, FlagValue>,
    pub unlocked_powers: HashSet<String>,
    #[serde(default)]
    pub reached_checkpoints: HashSet<String>,
}

/// Completion figures for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryProgress {
    pub completed_events: usize,
    pub total_events: usize,
    pub checkpoints_reached: usize,
    pub total_checkpoints: usize,
}

impl StoryProgress {
    pub fn event_ratio(&self) -> f32 {
        ratio(self.completed_events, self.total_events)
    }

    pub fn checkpoint_ratio(&self) -> f32 {
        ratio(self.checkpoints_reached, self.total_checkpoints)
    }
}

fn ratio(done: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        done as f32 / total as f32
    }
}

/// A choice whose conditions currently hold, with its index in the event.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableChoice {
    pub index: usize,
    pub choice: Choice,
}

/// Result of triggering an event.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Effects ran (unless the event is one-shot and already completed) and
    /// the event is recorded as completed.
    Resolved {
        event: StoryEvent,
        effects_applied: bool,
    },

    /// Branching event; nothing applies until a choice is selected.
    AwaitingChoice {
        event: StoryEvent,
        choices: Vec<AvailableChoice>,
    },

    /// The event's guard conditions do not hold. Nothing changed.
    Blocked { event: StoryEvent },
}

impl TriggerOutcome {
    pub fn event(&self) -> &StoryEvent {
        match self {
            TriggerOutcome::Resolved { event, .. }
            | TriggerOutcome::AwaitingChoice { event, .. }
            | TriggerOutcome::Blocked { event } => event,
        }
    }

    /// The event to continue with, if the story moves on by itself.
    pub fn next_event(&self) -> Option<&str> {
        match self {
            TriggerOutcome::Resolved { event, .. } => event.next_event.as_deref(),
            _ => None,
        }
    }
}

/// Result of selecting a choice on a branching event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOutcome {
    pub event_id: String,
    pub choice: Choice,
    pub effects_applied: bool,
}

impl ChoiceOutcome {
    pub fn next_event(&self) -> Option<&str> {
        self.choice.next_event.as_deref()
    }
}

/// Condition view over live story and power state.
pub struct StoryContext<'a> {
    story: &'a StorySystem,
    powers: &'a PowerRegistry,
}

impl<'a> StoryContext<'a> {
    pub fn new(story: &'a StorySystem, powers: &'a PowerRegistry) -> Self {
        Self { story, powers }
    }
}

impl ConditionContext for StoryContext<'_> {
    fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.story.flags.get(name)
    }

    fn is_power_unlocked(&self, power_id: &str) -> bool {
        self.powers.is_unlocked(power_id)
    }

    fn is_event_completed(&self, event_id: &str) -> bool {
        self.story.graph.is_completed(event_id)
    }
}

/// Orchestrates story traversal over the graph, flags and checkpoints.
#[derive(Debug, Clone)]
pub struct StorySystem {
    graph: StoryGraph,
    flags: FlagStore,
    checkpoints: CheckpointTracker,
    declared_checkpoints: Vec<String>,
    origin: DataOrigin,
}

impl Default for StorySystem {
    fn default() -> Self {
        Self {
            graph: StoryGraph::default(),
            flags: FlagStore::new(),
            checkpoints: CheckpointTracker::new(),
            declared_checkpoints: Vec::new(),
            origin: DataOrigin::Fallback,
        }
    }
}

impl StorySystem {
    /// Create a story system from an already loaded dataset. Returns the
    /// power catalog for the power system.
    pub fn from_data(data: StoryData, origin: DataOrigin) -> (Self, Vec<PowerDefinition>) {
        let story = Self {
            graph: StoryGraph::new(data.events),
            flags: FlagStore::new(),
            checkpoints: CheckpointTracker::new(),
            declared_checkpoints: data.checkpoints,
            origin,
        };
        (story, data.powers)
    }

    /// Load a dataset, falling back to the embedded one on any failure.
    /// Resets all story state. Returns the origin and the power catalog.
    pub fn load_story_data(&mut self, source: &DataSource) -> (DataOrigin, Vec<PowerDefinition>) {
        let (data, origin) = StoryData::load_or_fallback(source);
        tracing::info!(
            events = data.events.len(),
            powers = data.powers.len(),
            ?origin,
            "story data loaded"
        );
        let (story, powers) = Self::from_data(data, origin);
        *self = story;
        (origin, powers)
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn graph(&self) -> &StoryGraph {
        &self.graph
    }

    pub fn checkpoints(&self) -> &CheckpointTracker {
        &self.checkpoints
    }

    pub(crate) fn checkpoints_mut(&mut self) -> &mut CheckpointTracker {
        &mut self.checkpoints
    }

    /// Trigger an event by id.
    pub fn trigger_story_event(
        &mut self,
        event_id: &str,
        powers: &mut PowerSystem,
    ) -> Result<TriggerOutcome, StoryError> {
        let event = self
            .graph
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoryError::UnknownEvent(event_id.to_string()))?;

        if !self.check_story_conditions(&event.conditions, powers.registry()) {
            tracing::debug!(event_id, "story event blocked by conditions");
            return Ok(TriggerOutcome::Blocked { event });
        }

        if event.is_branching() {
            let ctx = StoryContext::new(self, powers.registry());
            let choices = event
                .content
                .choices
                .iter()
                .enumerate()
                .filter(|(_, choice)| conditions_met(&choice.conditions, &ctx))
                .map(|(index, choice)| AvailableChoice {
                    index,
                    choice: choice.clone(),
                })
                .collect();
            return Ok(TriggerOutcome::AwaitingChoice { event, choices });
        }

        let effects_applied = !(event.once && self.graph.is_completed(&event.id));
        if effects_applied {
            self.apply_effects(&event.effects, &event.id, powers);
        }
        self.graph.mark_completed(&event.id);
        tracing::debug!(event_id, effects_applied, "story event resolved");

        Ok(TriggerOutcome::Resolved {
            event,
            effects_applied,
        })
    }

    /// Resolve a branching event with the choice at `index`.
    pub fn select_choice(
        &mut self,
        event_id: &str,
        index: usize,
        powers: &mut PowerSystem,
    ) -> Result<ChoiceOutcome, StoryError> {
        let event = self
            .graph
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoryError::UnknownEvent(event_id.to_string()))?;
        if !event.is_branching() {
            return Err(StoryError::NotABranch(event_id.to_string()));
        }
        let choice = event
            .content
            .choices
            .get(index)
            .cloned()
            .ok_or_else(|| StoryError::InvalidChoice {
                event_id: event_id.to_string(),
                index,
            })?;

        let allowed = self.check_story_conditions(&event.conditions, powers.registry())
            && self.check_story_conditions(&choice.conditions, powers.registry());
        if !allowed {
            return Err(StoryError::ChoiceBlocked {
                event_id: event_id.to_string(),
                index,
            });
        }

        let effects_applied = !(event.once && self.graph.is_completed(&event.id));
        if effects_applied {
            self.apply_effects(&event.effects, &event.id, powers);
            self.apply_effects(&choice.effects, &event.id, powers);
        }
        self.graph.mark_completed(&event.id);
        tracing::debug!(event_id, index, "story choice selected");

        Ok(ChoiceOutcome {
            event_id: event.id,
            choice,
            effects_applied,
        })
    }

    fn apply_effects(&mut self, effects: &[Effect], origin: &str, powers: &mut PowerSystem) {
        for effect in effects {
            match effect {
                Effect::SetFlag { name, value } => {
                    self.set_story_flag(name.clone(), value.clone());
                }
                Effect::UnlockPower { power_id } => {
                    if let Err(err) = self.unlock_power(power_id, origin, powers) {
                        tracing::warn!(event_id = origin, error = %err, "unlock effect skipped");
                    }
                }
                Effect::SetCheckpoint { name } => {
                    self.set_checkpoint(name.clone());
                }
            }
        }
    }

    pub fn set_story_flag(&mut self, name: impl Into<String>, value: impl Into<FlagValue>) {
        self.flags.set(name, value.into());
    }

    pub fn get_story_flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Equality check; false when the flag is unset.
    pub fn check_story_flag(&self, name: &str, expected: &FlagValue) -> bool {
        self.flags.check(name, expected)
    }

    pub fn check_story_conditions(&self, conditions: &[Condition], powers: &PowerRegistry) -> bool {
        conditions_met(conditions, &StoryContext::new(self, powers))
    }

    /// Set the current checkpoint. Returns true when an autosave was queued.
    pub fn set_checkpoint(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let queued = self.checkpoints.set(name.clone());
        tracing::debug!(checkpoint = %name, autosave_queued = queued, "checkpoint set");
        queued
    }

    /// Whether `name` is the current checkpoint.
    pub fn has_reached_checkpoint(&self, name: &str) -> bool {
        self.checkpoints.is_current(name)
    }

    /// Unlock a power on behalf of the story. Returns whether state changed.
    pub fn unlock_power(
        &mut self,
        power_id: &str,
        source: &str,
        powers: &mut PowerSystem,
    ) -> Result<bool, StoryError> {
        powers
            .unlock_power(power_id, source)
            .ok_or_else(|| StoryError::UnknownPower(power_id.to_string()))
    }

    pub fn get_story_state(&self, powers: &PowerRegistry) -> StoryState {
        StoryState {
            current_checkpoint: self.checkpoints.current().map(str::to_string),
            completed_events: self.graph.completed().clone(),
            story_flags: self.flags.to_map(),
            unlocked_powers: powers.unlocked_ids(),
            reached_checkpoints: self.checkpoints.reached().clone(),
        }
    }

    pub fn get_story_progress(&self) -> StoryProgress {
        StoryProgress {
            completed_events: self.graph.completed_count(),
            total_events: self.graph.total_events(),
            checkpoints_reached: self
                .declared_checkpoints
                .iter()
                .filter(|name| self.checkpoints.has_reached(name))
                .count(),
            total_checkpoints: self.declared_checkpoints.len(),
        }
    }

    /// Replace story state wholesale. Unlocked powers live in the power
    /// registry and are restored there.
    pub fn restore(&mut self, state: StoryState) {
        self.graph.replace_completed(state.completed_events);
        self.flags.replace(state.story_flags);
        self.checkpoints
            .restore(state.current_checkpoint, state.reached_checkpoints);
    }
}
