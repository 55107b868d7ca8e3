//! Save record format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::powers::PowerRuntimeState;
use crate::story::StoryState;

/// Current save schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Unique identifier for one written save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaveId(pub Uuid);

impl SaveId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SaveId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SaveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    Manual,
    Auto,
}

/// Owned copy of everything a save contains, captured before any write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub story: StoryState,
    pub powers: HashMap<String, PowerRuntimeState>,
    pub extra: Value,
}

/// A complete persisted save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub schema_version: u32,
    pub save_id: SaveId,
    /// Write order; breaks timestamp ties.
    pub sequence: u64,
    pub key: String,
    pub kind: SaveKind,
    /// Checkpoint that produced an auto save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub timestamp: u64,
    pub story: StoryState,
    pub powers: HashMap<String, PowerRuntimeState>,
    #[serde(default)]
    pub extra: Value,
}

impl SaveRecord {
    pub fn info(&self) -> SaveSlotInfo {
        SaveSlotInfo {
            key: self.key.clone(),
            kind: self.kind,
            timestamp: self.timestamp,
            sequence: self.sequence,
            checkpoint: self.story.current_checkpoint.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

/// Manifest entry: slot metadata without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlotInfo {
    pub key: String,
    pub kind: SaveKind,
    pub timestamp: u64,
    pub sequence: u64,
    pub checkpoint: Option<String>,
    pub trigger: Option<String>,
}

impl SaveSlotInfo {
    /// Ordering key, newest last.
    pub(crate) fn recency(&self) -> (u64, u64) {
        (self.timestamp, self.sequence)
    }
}

/// Just enough of a record to build a manifest entry or check its version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordHeader {
    pub schema_version: u32,
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub kind: Option<SaveKind>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub story: Option<HeaderStory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HeaderStory {
    #[serde(default)]
    pub current_checkpoint: Option<String>,
}
