//! Persistence manager - manual and rotating auto save slots.
//!
//! Saves serialize an owned [`Snapshot`] before the store is touched, so
//! nothing that happens after the call can leak into the written payload.
//! Loads validate the whole record before handing it back; the caller swaps
//! live state only on success.

mod record;
mod store;

pub use record::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::SessionConfig;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no save under key '{0}'")]
    NotFound(String),

    #[error("manual slot {index} out of range (0..{count})")]
    InvalidSlot { index: usize, count: usize },

    #[error("save '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Introspection for UI and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceStatus {
    pub autosave_enabled: bool,
    pub manual_slot_count: usize,
    pub auto_slot_count: usize,
    pub saves_on_record: usize,
    pub last_save: Option<SaveSlotInfo>,
    pub last_error: Option<String>,
}

/// Key for a manual slot index.
pub fn manual_slot_key(index: usize) -> String {
    format!("manual-{index}")
}

/// Key for an auto slot position.
pub fn auto_slot_key(index: usize) -> String {
    format!("auto-{index}")
}

/// Writes snapshots to slots and reads them back.
pub struct PersistenceManager {
    store: Box<dyn SaveStore>,
    clock: Arc<dyn Clock>,
    manifest: Vec<SaveSlotInfo>,
    next_sequence: u64,
    manual_slot_count: usize,
    auto_slot_count: usize,
    autosave_enabled: bool,
    last_save: Option<SaveSlotInfo>,
    last_error: Option<String>,
}

impl PersistenceManager {
    /// Create a manager over `store`, indexing whatever saves it already holds.
    pub fn new(store: Box<dyn SaveStore>, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        let mut manager = Self {
            store,
            clock,
            manifest: Vec::new(),
            next_sequence: 0,
            manual_slot_count: config.manual_slot_count,
            auto_slot_count: config.auto_slot_count,
            autosave_enabled: config.autosave_enabled,
            last_save: None,
            last_error: None,
        };
        manager.rebuild_manifest();
        manager
    }

    fn rebuild_manifest(&mut self) {
        self.manifest.clear();
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "could not list existing saves");
                return;
            }
        };

        for key in keys {
            match self.read_header(&key) {
                Ok(info) => self.manifest.push(info),
                Err(err) => tracing::warn!(%key, error = %err, "skipping unreadable save"),
            }
        }
        self.next_sequence = self
            .manifest
            .iter()
            .map(|info| info.sequence + 1)
            .max()
            .unwrap_or(0);
        tracing::debug!(saves = self.manifest.len(), "save manifest rebuilt");
    }

    fn read_header(&self, key: &str) -> Result<SaveSlotInfo, PersistError> {
        let bytes = self
            .store
            .read(key)?
            .ok_or_else(|| PersistError::NotFound(key.to_string()))?;
        let header: RecordHeader =
            serde_json::from_slice(&bytes).map_err(|err| PersistError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            })?;
        let kind = header.kind.unwrap_or(if key.starts_with("auto-") {
            SaveKind::Auto
        } else {
            SaveKind::Manual
        });

        if let Some(recorded) = header.key.as_deref().filter(|recorded| *recorded != key) {
            tracing::warn!(
                %key,
                recorded,
                "save header names a different slot, using the store key"
            );
        }

        Ok(SaveSlotInfo {
            key: key.to_string(),
            kind,
            timestamp: header.timestamp,
            sequence: header.sequence,
            checkpoint: header.story.and_then(|s| s.current_checkpoint),
            trigger: header.trigger,
        })
    }

    /// Save to manual slot `slot_index`, overwriting it.
    pub fn manual_save(
        &mut self,
        slot_index: usize,
        snapshot: Snapshot,
    ) -> Result<SaveSlotInfo, PersistError> {
        if slot_index >= self.manual_slot_count {
            return Err(PersistError::InvalidSlot {
                index: slot_index,
                count: self.manual_slot_count,
            });
        }
        let key = manual_slot_key(slot_index);
        self.write_record(key, SaveKind::Manual, None, snapshot)
    }

    /// Save to the rotating auto set. `Ok(None)` when autosave is off.
    pub(crate) fn auto_save(
        &mut self,
        trigger: &str,
        snapshot: Snapshot,
    ) -> Result<Option<SaveSlotInfo>, PersistError> {
        if !self.autosave_enabled || self.auto_slot_count == 0 {
            tracing::debug!(trigger, "autosave disabled, request dropped");
            return Ok(None);
        }
        let (key, stale) = self.next_auto_key();
        let info = self.write_record(key, SaveKind::Auto, Some(trigger.to_string()), snapshot)?;
        self.evict(&stale);
        Ok(Some(info))
    }

    /// Pick the auto key to write and the auto saves to drop so the rotation
    /// holds at most `auto_slot_count` entries afterwards. The key is always
    /// in `0..auto_slot_count`; the oldest saves go first.
    fn next_auto_key(&self) -> (String, Vec<String>) {
        let mut autos: Vec<&SaveSlotInfo> = self
            .manifest
            .iter()
            .filter(|info| info.kind == SaveKind::Auto)
            .collect();
        autos.sort_by_key(|info| info.recency());

        let excess = (autos.len() + 1).saturating_sub(self.auto_slot_count);
        let (victims, kept) = autos.split_at(excess.min(autos.len()));

        // At most `auto_slot_count - 1` saves remain, so a free key exists.
        let key = (0..self.auto_slot_count)
            .map(auto_slot_key)
            .find(|key| !kept.iter().any(|info| &info.key == key))
            .unwrap_or_else(|| auto_slot_key(0));
        let stale = victims
            .iter()
            .map(|info| info.key.clone())
            .filter(|victim| *victim != key)
            .collect();
        (key, stale)
    }

    fn evict(&mut self, keys: &[String]) {
        for key in keys {
            match self.store.remove(key) {
                Ok(_) => {
                    self.manifest.retain(|info| &info.key != key);
                    tracing::debug!(%key, "evicted autosave");
                }
                Err(err) => {
                    tracing::warn!(%key, error = %err, "could not evict autosave");
                    self.last_error = Some(err.to_string());
                }
            }
        }
    }

    fn write_record(
        &mut self,
        key: String,
        kind: SaveKind,
        trigger: Option<String>,
        snapshot: Snapshot,
    ) -> Result<SaveSlotInfo, PersistError> {
        let record = SaveRecord {
            schema_version: SCHEMA_VERSION,
            save_id: SaveId::new(),
            sequence: self.next_sequence,
            key: key.clone(),
            kind,
            trigger,
            timestamp: self.clock.now_ms(),
            story: snapshot.story,
            powers: snapshot.powers,
            extra: snapshot.extra,
        };

        let result = serde_json::to_vec_pretty(&record)
            .map_err(PersistError::from)
            .and_then(|bytes| self.store.write(&key, &bytes).map_err(PersistError::from));
        if let Err(err) = result {
            tracing::warn!(%key, error = %err, "save failed");
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let info = record.info();
        self.next_sequence += 1;
        self.manifest.retain(|existing| existing.key != key);
        self.manifest.push(info.clone());
        self.last_save = Some(info.clone());
        self.last_error = None;
        tracing::info!(%key, ?kind, save_id = %record.save_id, "game saved");
        Ok(info)
    }

    /// Manifest entries, most recent first.
    pub fn get_available_saves(&self) -> Vec<SaveSlotInfo> {
        let mut saves = self.manifest.clone();
        saves.sort_by_key(|info| std::cmp::Reverse(info.recency()));
        saves
    }

    /// Read and validate a save. Nothing live is touched here.
    pub fn load_game(&mut self, key: &str) -> Result<SaveRecord, PersistError> {
        let result = self.read_record(key);
        match &result {
            Ok(record) => tracing::info!(%key, save_id = %record.save_id, "save loaded"),
            Err(err) => {
                tracing::warn!(%key, error = %err, "load aborted");
                self.last_error = Some(err.to_string());
            }
        }
        result
    }

    fn read_record(&self, key: &str) -> Result<SaveRecord, PersistError> {
        let bytes = self
            .store
            .read(key)?
            .ok_or_else(|| PersistError::NotFound(key.to_string()))?;
        let corrupt = |err: serde_json::Error| PersistError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        };

        let header: RecordHeader = serde_json::from_slice(&bytes).map_err(corrupt)?;
        if header.schema_version != SCHEMA_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: header.schema_version,
            });
        }
        serde_json::from_slice(&bytes).map_err(corrupt)
    }

    /// Delete a save. Returns whether one existed.
    pub fn delete_save(&mut self, key: &str) -> Result<bool, PersistError> {
        let removed = self.store.remove(key)?;
        self.manifest.retain(|info| info.key != key);
        Ok(removed)
    }

    pub fn get_status(&self) -> PersistenceStatus {
        PersistenceStatus {
            autosave_enabled: self.autosave_enabled,
            manual_slot_count: self.manual_slot_count,
            auto_slot_count: self.auto_slot_count,
            saves_on_record: self.manifest.len(),
            last_save: self.last_save.clone(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn is_auto_save_enabled(&self) -> bool {
        self.autosave_enabled
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.autosave_enabled = enabled;
    }

    pub fn store(&self) -> &dyn SaveStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SaveStore {
        self.store.as_mut()
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("manifest", &self.manifest)
            .field("autosave_enabled", &self.autosave_enabled)
            .finish()
    }
}
