//! Story flag storage.

use std::collections::HashMap;
use story_rules::FlagValue;

/// Named values set by narrative effects. Last write wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagStore {
    flags: HashMap<String, FlagValue>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FlagValue) -> Option<FlagValue> {
        self.flags.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Equality test. Unset flags never match.
    pub fn check(&self, name: &str, expected: &FlagValue) -> bool {
        self.flags.get(name) == Some(expected)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn to_map(&self) -> HashMap<String, FlagValue> {
        self.flags.clone()
    }

    /// Replace every flag at once.
    pub fn replace(&mut self, flags: HashMap<String, FlagValue>) {
        self.flags = flags;
    }
}
