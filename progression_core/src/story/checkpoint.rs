//! Checkpoint tracking and autosave deduplication.

use std::collections::{HashSet, VecDeque};

/// A request for one autosave, produced the first time a checkpoint is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveRequest {
    pub checkpoint: String,
}

/// Current checkpoint, the persisted history of reached checkpoints, and the
/// session-scoped set of checkpoints that already produced an autosave request.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTracker {
    current: Option<String>,
    reached: HashSet<String>,
    triggered: HashSet<String>,
    pending: VecDeque<AutosaveRequest>,
}

impl CheckpointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current checkpoint. Returns true when an autosave was queued.
    pub fn set(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.reached.insert(name.clone());
        let first_time = self.triggered.insert(name.clone());
        if first_time {
            self.pending.push_back(AutosaveRequest {
                checkpoint: name.clone(),
            });
        }
        self.current = Some(name);
        first_time
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current.as_deref() == Some(name)
    }

    /// Whether `name` is part of the current timeline's history.
    pub fn has_reached(&self, name: &str) -> bool {
        self.reached.contains(name)
    }

    pub fn reached(&self) -> &HashSet<String> {
        &self.reached
    }

    pub fn has_triggered(&self, name: &str) -> bool {
        self.triggered.contains(name)
    }

    pub fn triggered(&self) -> impl Iterator<Item = &str> {
        self.triggered.iter().map(String::as_str)
    }

    /// Take every queued autosave request.
    pub fn drain_pending(&mut self) -> Vec<AutosaveRequest> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Restore the current checkpoint and reached history from a save. The
    /// history is replaced; the dedup set only gains the restored checkpoint,
    /// without queueing a request.
    pub fn restore(&mut self, current: Option<String>, reached: HashSet<String>) {
        self.reached = reached;
        if let Some(name) = &current {
            self.reached.insert(name.clone());
            self.triggered.insert(name.clone());
        }
        self.current = current;
    }

    /// Forget everything, including the dedup set.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_set_queues_autosave() {
        let mut tracker = CheckpointTracker::new();

        assert!(tracker.set("tutorial_checkpoint"));
        assert!(!tracker.set("tutorial_checkpoint"));

        let pending = tracker.drain_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].checkpoint, "tutorial_checkpoint");
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_revisiting_does_not_requeue() {
        let mut tracker = CheckpointTracker::new();
        tracker.set("a");
        tracker.set("b");
        tracker.set("a");

        assert!(tracker.is_current("a"));
        assert!(!tracker.is_current("b"));
        assert!(tracker.has_triggered("b"));
        assert_eq!(tracker.drain_pending().len(), 2);
    }

    #[test]
    fn test_restore_marks_triggered() {
        let mut tracker = CheckpointTracker::new();
        tracker.restore(Some("act_one_end".to_string()), HashSet::new());

        assert_eq!(tracker.current(), Some("act_one_end"));
        assert!(tracker.has_reached("act_one_end"));
        assert!(!tracker.set("act_one_end"));
        assert!(!tracker.has_pending());
    }

    #[test]
    fn test_restore_replaces_history_but_keeps_dedup() {
        let mut tracker = CheckpointTracker::new();
        tracker.set("a");
        tracker.set("b");
        tracker.drain_pending();

        tracker.restore(None, HashSet::new());

        assert!(!tracker.has_reached("a"));
        assert!(!tracker.has_reached("b"));
        assert!(tracker.reached().is_empty());
        assert!(tracker.has_triggered("a"));
        assert!(!tracker.set("a"));
        assert!(tracker.has_reached("a"));
        assert!(!tracker.has_pending());
    }
}
