//! Story datasets: loading, validation and the embedded fallback.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::events::{Effect, StoryEvent};
use crate::powers::PowerDefinition;

const FALLBACK_STORY: &str = include_str!("../../data/default_story.json");

/// Errors from reading a story dataset.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Dataset contains no events")]
    EmptyDataset,
}

/// Where a dataset comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Json(String),
    Toml(String),
    /// File path; `.toml` files are read as TOML, everything else as JSON.
    Path(PathBuf),
    /// Use the embedded dataset directly.
    Embedded,
}

/// Whether the live dataset is the requested one or the embedded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOrigin {
    Loaded,
    Fallback,
}

/// Structural problems found while validating a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIssue {
    #[error("duplicate event id '{0}'")]
    DuplicateEvent(String),

    #[error("duplicate power id '{0}'")]
    DuplicatePower(String),

    #[error("event '{from}' links to missing event '{to}'")]
    MissingEvent { from: String, to: String },

    #[error("event '{event}' unlocks unknown power '{power}'")]
    UnknownPower { event: String, power: String },
}

/// A complete story definition: events, powers and the declared checkpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryData {
    #[serde(default)]
    pub events: Vec<StoryEvent>,

    #[serde(default)]
    pub powers: Vec<PowerDefinition>,

    #[serde(default)]
    pub checkpoints: Vec<String>,
}

impl StoryData {
    /// Parse a JSON dataset.
    pub fn from_json_str(source: &str) -> Result<Self, DataLoadError> {
        let data: Self = serde_json::from_str(source)?;
        data.ensure_non_empty()
    }

    /// Parse a TOML dataset.
    pub fn from_toml_str(source: &str) -> Result<Self, DataLoadError> {
        let data: Self = toml::from_str(source)?;
        data.ensure_non_empty()
    }

    /// Read a dataset file, choosing the format by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        if path.extension().map(|e| e == "toml").unwrap_or(false) {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Strict load: any failure is returned.
    pub fn load(source: &DataSource) -> Result<Self, DataLoadError> {
        match source {
            DataSource::Json(s) => Self::from_json_str(s),
            DataSource::Toml(s) => Self::from_toml_str(s),
            DataSource::Path(path) => Self::from_path(path),
            DataSource::Embedded => Self::from_json_str(FALLBACK_STORY),
        }
    }

    /// Lenient load: failures are logged and the embedded dataset is used.
    pub fn load_or_fallback(source: &DataSource) -> (Self, DataOrigin) {
        match Self::load(source) {
            Ok(data) => {
                for issue in data.validate() {
                    tracing::warn!(%issue, "story dataset issue");
                }
                (data, DataOrigin::Loaded)
            }
            Err(err) => {
                tracing::warn!(error = %err, "story data unavailable, using embedded dataset");
                (Self::fallback(), DataOrigin::Fallback)
            }
        }
    }

    /// The embedded default dataset.
    pub fn fallback() -> Self {
        match Self::from_json_str(FALLBACK_STORY) {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(error = %err, "embedded story dataset failed to parse");
                Self::default()
            }
        }
    }

    fn ensure_non_empty(self) -> Result<Self, DataLoadError> {
        if self.events.is_empty() {
            Err(DataLoadError::EmptyDataset)
        } else {
            Ok(self)
        }
    }

    /// Check graph integrity. Issues are reported, never fatal.
    pub fn validate(&self) -> Vec<DataIssue> {
        let mut issues = Vec::new();

        let mut event_ids = HashSet::new();
        for event in &self.events {
            if !event_ids.insert(event.id.as_str()) {
                issues.push(DataIssue::DuplicateEvent(event.id.clone()));
            }
        }

        let mut power_ids = HashSet::new();
        for power in &self.powers {
            if !power_ids.insert(power.id.as_str()) {
                issues.push(DataIssue::DuplicatePower(power.id.clone()));
            }
        }

        for event in &self.events {
            for target in event.outgoing_edges() {
                if !event_ids.contains(target) {
                    issues.push(DataIssue::MissingEvent {
                        from: event.id.clone(),
                        to: target.to_string(),
                    });
                }
            }

            for effect in event.all_effects() {
                if let Effect::UnlockPower { power_id } = effect {
                    if !power_ids.contains(power_id.as_str()) {
                        issues.push(DataIssue::UnknownPower {
                            event: event.id.clone(),
                            power: power_id.clone(),
                        });
                    }
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_fallback_dataset_is_valid() {
        let data = StoryData::fallback();

        assert!(!data.events.is_empty());
        assert!(data.events.iter().any(|e| e.id == "game_start"));
        assert!(data.powers.iter().any(|p| p.id == "telekinesis"));
        assert!(data.checkpoints.contains(&"tutorial_checkpoint".to_string()));
        assert_eq!(data.validate(), Vec::new());
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let (data, origin) = StoryData::load_or_fallback(&DataSource::Json("{not json".into()));
        assert_eq!(origin, DataOrigin::Fallback);
        assert_eq!(data, StoryData::fallback());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let source = DataSource::Path(PathBuf::from("/nonexistent/story.json"));
        assert!(matches!(StoryData::load(&source), Err(DataLoadError::Io(_))));

        let (_, origin) = StoryData::load_or_fallback(&source);
        assert_eq!(origin, DataOrigin::Fallback);
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        let result = StoryData::from_json_str(r#"{"events": []}"#);
        assert!(matches!(result, Err(DataLoadError::EmptyDataset)));
    }

    #[test]
    fn test_toml_dataset() {
        let source = r#"
            checkpoints = ["gate"]

            [[events]]
            id = "start"
            type = "dialogue"
            nextEvent = "gate_reached"

            [[events]]
            id = "gate_reached"
            type = "flag-effect"
            effects = [{ kind = "set-checkpoint", name = "gate" }]

            [[powers]]
            id = "dash"
            cooldownMs = 500
        "#;
        let (data, origin) = StoryData::load_or_fallback(&DataSource::Toml(source.into()));

        assert_eq!(origin, DataOrigin::Loaded);
        assert_eq!(data.events.len(), 2);
        assert_eq!(data.events[1].kind, EventKind::FlagEffect);
        assert_eq!(data.powers[0].cooldown_ms, 500);
    }

    #[test]
    fn test_validate_reports_broken_edges() {
        let data = StoryData {
            events: vec![
                StoryEvent::new("a", EventKind::Dialogue).with_next("missing"),
                StoryEvent::new("a", EventKind::Unlock).with_effect(Effect::unlock_power("ghost")),
            ],
            powers: Vec::new(),
            checkpoints: Vec::new(),
        };
        let issues = data.validate();

        assert!(issues.contains(&DataIssue::DuplicateEvent("a".into())));
        assert!(issues.contains(&DataIssue::MissingEvent {
            from: "a".into(),
            to: "missing".into()
        }));
        assert!(issues.contains(&DataIssue::UnknownPower {
            event: "a".into(),
            power: "ghost".into()
        }));
    }
}
