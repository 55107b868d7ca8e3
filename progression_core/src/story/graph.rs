//! Story graph - event definitions and completion tracking.

use std::collections::{HashMap, HashSet};
use story_rules::StoryEvent;

/// Loaded event definitions and the set of completed event ids.
#[derive(Debug, Clone, Default)]
pub struct StoryGraph {
    events: HashMap<String, StoryEvent>,
    /// Load order, for listing.
    order: Vec<String>,
    completed: HashSet<String>,
}

impl StoryGraph {
    /// Build a graph. On duplicate ids the first definition is kept.
    pub fn new(events: Vec<StoryEvent>) -> Self {
        let mut graph = Self::default();
        for event in events {
            if graph.events.contains_key(&event.id) {
                tracing::warn!(event_id = %event.id, "duplicate story event ignored");
                continue;
            }
            graph.order.push(event.id.clone());
            graph.events.insert(event.id.clone(), event);
        }
        graph
    }

    pub fn get(&self, event_id: &str) -> Option<&StoryEvent> {
        self.events.get(event_id)
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.events.contains_key(event_id)
    }

    /// Events in load order.
    pub fn events(&self) -> impl Iterator<Item = &StoryEvent> {
        self.order.iter().filter_map(|id| self.events.get(id))
    }

    pub fn total_events(&self) -> usize {
        self.events.len()
    }

    pub fn is_completed(&self, event_id: &str) -> bool {
        self.completed.contains(event_id)
    }

    /// Record completion. Returns true the first time.
    pub fn mark_completed(&mut self, event_id: &str) -> bool {
        self.completed.insert(event_id.to_string())
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }

    /// Completed events that exist in this graph.
    pub fn completed_count(&self) -> usize {
        self.completed
            .iter()
            .filter(|id| self.events.contains_key(*id))
            .count()
    }

    /// Replace the completed set wholesale.
    pub fn replace_completed(&mut self, completed: HashSet<String>) {
        self.completed = completed;
    }
}
