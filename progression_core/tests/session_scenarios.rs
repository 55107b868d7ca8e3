//! End-to-end scenarios over a full game session with the embedded story.

use progression_core::{
    ActivationError, DirectoryStore, GameSession, ManualClock, MemoryStore, PersistError,
    PowerState, SaveKind, SessionConfig, TriggerOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;
use story_rules::{Condition, DataSource, FlagValue};

fn session_with(config: SessionConfig) -> (GameSession, ManualClock) {
    let clock = ManualClock::new(1_000_000);
    let session = GameSession::with_parts(
        &config,
        &DataSource::Embedded,
        Box::new(MemoryStore::new()),
        Arc::new(clock.clone()),
    );
    (session, clock)
}

fn session() -> (GameSession, ManualClock) {
    session_with(SessionConfig::default())
}

#[test]
fn test_flag_set_get_check() {
    let (mut session, _) = session();

    for (name, value) in [
        ("met_mentor", FlagValue::Bool(true)),
        ("coins", FlagValue::Int(12)),
        ("ally", FlagValue::from("mentor")),
    ] {
        session.set_story_flag(name, value.clone());
        assert_eq!(session.get_story_flag(name), Some(&value));
        assert!(session.check_story_flag(name, value));
    }

    session.set_story_flag("door_open", true);
    assert!(session.check_story_flag("door_open", true));
    assert!(!session.check_story_flag("door_open", false));
}

#[test]
fn test_empty_conditions_hold() {
    let (session, _) = session();
    assert!(session.check_story_conditions(&[]));
    assert!(!session.check_story_conditions(&[Condition::Unknown]));
}

#[test]
fn test_double_unlock_lists_once() {
    let (mut session, _) = session();

    assert_eq!(session.unlock_power("telekinesis", "test_trigger"), Ok(true));
    assert_eq!(session.unlock_power("telekinesis", "test_trigger"), Ok(false));

    let unlocked: Vec<_> = session
        .get_unlocked_power_list()
        .into_iter()
        .filter(|p| p.id == "telekinesis")
        .collect();
    assert_eq!(unlocked.len(), 1);
}

#[test]
fn test_locked_activation_leaves_no_trace() {
    let (mut session, _) = session();

    let err = session.activate_power("barrier", json!({})).unwrap_err();
    assert_eq!(err, ActivationError::Locked("barrier".to_string()));
    assert_eq!(err.reason(), "locked");
    assert!(session.power_runtime("barrier").unwrap().last_activated_at.is_none());
}

#[test]
fn test_cooldown_elapses() {
    let (mut session, clock) = session();
    session.unlock_power("barrier", "test").unwrap();

    session.activate_power("barrier", Value::Null).unwrap();
    assert!(session.get_remaining_cooldown("barrier") > 0);
    assert!(session.is_power_active("barrier"));

    clock.advance(10_000);
    assert_eq!(session.get_remaining_cooldown("barrier"), 0);
    assert!(!session.is_power_active("barrier"));
    assert_eq!(session.power_state("barrier"), Some(PowerState::Ready));
}

#[test]
fn test_telekinesis_scenario() {
    let (mut session, _) = session();

    session.unlock_power("telekinesis", "test_trigger").unwrap();
    assert!(session.check_power_availability("telekinesis"));

    let activation = session
        .activate_power("telekinesis", json!({"test": true}))
        .unwrap();
    assert_eq!(activation.context["test"], json!(true));

    match session.activate_power("telekinesis", json!({"test": true})) {
        Err(err @ ActivationError::Cooldown { .. }) => {
            assert_eq!(err.reason(), "cooldown");
            if let ActivationError::Cooldown { remaining_ms, .. } = err {
                assert!(remaining_ms > 0);
            }
        }
        other => panic!("expected cooldown failure, got {:?}", other),
    }
}

#[test]
fn test_game_start_completion_is_a_set() {
    let (mut session, _) = session();

    let outcome = session.trigger_story_event("game_start").unwrap();
    assert!(matches!(outcome, TriggerOutcome::Resolved { .. }));
    assert!(session.get_story_state().completed_events.contains("game_start"));

    session.trigger_story_event("game_start").unwrap();
    let completed = session.get_story_state().completed_events;
    assert_eq!(completed.iter().filter(|id| *id == "game_start").count(), 1);
    assert_eq!(completed.len(), 1);
}

#[test]
fn test_checkpoint_autosaves_once() {
    let (mut session, _) = session();

    assert!(session.set_checkpoint("tutorial_checkpoint"));
    assert!(!session.set_checkpoint("tutorial_checkpoint"));

    let autos: Vec<_> = session
        .get_available_saves()
        .into_iter()
        .filter(|s| s.kind == SaveKind::Auto)
        .collect();
    assert_eq!(autos.len(), 1);
    assert_eq!(autos[0].trigger.as_deref(), Some("tutorial_checkpoint"));
    assert!(session.has_reached_checkpoint("tutorial_checkpoint"));
}

#[test]
fn test_autosave_disabled_still_dedups() {
    let (mut session, _) = session();
    session.set_auto_save_enabled(false);
    assert!(!session.is_auto_save_enabled());

    session.set_checkpoint("tutorial_checkpoint");
    assert_eq!(session.auto_save_count(), 0);

    session.set_auto_save_enabled(true);
    session.set_checkpoint("tutorial_checkpoint");
    assert_eq!(session.auto_save_count(), 0);

    session.set_checkpoint("first_trial_checkpoint");
    assert_eq!(session.auto_save_count(), 1);
}

#[test]
fn test_manual_save_round_trip() {
    let (mut session, clock) = session();
    session.trigger_story_event("game_start").unwrap();
    session.unlock_power("telekinesis", "test_trigger").unwrap();
    session.activate_power("telekinesis", Value::Null).unwrap();
    session.set_checkpoint("tutorial_checkpoint");

    let state_before = session.get_story_state();
    let powers_before: Vec<_> = session
        .get_power_list()
        .iter()
        .map(|p| session.power_runtime(&p.id).cloned())
        .collect();
    let info = session.manual_save(0).unwrap();
    assert_eq!(info.key, GameSession::manual_slot_key(0));

    clock.advance(60_000);
    session.set_story_flag("game_started", false);
    session.set_story_flag("new_flag", 3i64);
    session.trigger_story_event("telekinesis_awakening").unwrap();
    session.unlock_power("barrier", "test").unwrap();
    session.activate_power("barrier", Value::Null).unwrap();
    session.set_checkpoint("first_trial_checkpoint");

    session.load_game(&info.key).unwrap();

    assert_eq!(session.get_story_state(), state_before);
    let powers_after: Vec<_> = session
        .get_power_list()
        .iter()
        .map(|p| session.power_runtime(&p.id).cloned())
        .collect();
    assert_eq!(powers_after, powers_before);
    assert!(session.has_reached_checkpoint("tutorial_checkpoint"));
}

#[test]
fn test_load_replaces_checkpoint_progress() {
    let (mut session, _) = session();
    session.manual_save(0).unwrap();
    session.set_checkpoint("tutorial_checkpoint");
    session.set_checkpoint("first_trial_checkpoint");
    session.manual_save(1).unwrap();
    assert_eq!(session.get_story_progress().checkpoints_reached, 2);

    session.load_game("manual-0").unwrap();
    assert_eq!(session.get_story_progress().checkpoints_reached, 0);
    assert!(!session.has_reached_checkpoint("first_trial_checkpoint"));

    let (mut fresh, _) = session_with(SessionConfig::default());
    fresh
        .persistence_mut()
        .store_mut()
        .write("manual-1", &session.persistence().store().read("manual-1").unwrap().unwrap())
        .unwrap();
    fresh.load_game("manual-1").unwrap();
    assert_eq!(fresh.get_story_progress().checkpoints_reached, 2);
    assert!(fresh.get_story_state().reached_checkpoints.contains("tutorial_checkpoint"));
}

#[test]
fn test_snapshot_is_taken_at_call_time() {
    let (mut session, _) = session();
    session.set_story_flag("phase", 1i64);
    session.manual_save(2).unwrap();
    session.set_story_flag("phase", 2i64);

    session.load_game("manual-2").unwrap();
    assert_eq!(session.get_story_flag("phase"), Some(&FlagValue::Int(1)));
}

#[test]
fn test_version_mismatch_keeps_state() {
    let (mut session, _) = session();
    session.set_story_flag("door_open", true);
    session
        .persistence_mut()
        .store_mut()
        .write("manual-0", br#"{"schemaVersion": 2, "story": {}}"#)
        .unwrap();

    let before = session.get_story_state();
    let result = session.load_game("manual-0");

    assert!(matches!(
        result,
        Err(PersistError::VersionMismatch { expected: 1, found: 2 })
    ));
    assert_eq!(session.get_story_state(), before);
    assert!(session.get_status().last_error.is_some());
}

#[test]
fn test_auto_rotation_is_fifo() {
    let config = SessionConfig {
        auto_slot_count: 2,
        ..Default::default()
    };
    let (mut session, clock) = session_with(config);

    for checkpoint in ["tutorial_checkpoint", "first_trial_checkpoint", "act_one_end"] {
        session.set_checkpoint(checkpoint);
        clock.advance(1_000);
    }

    let triggers: Vec<_> = session
        .get_available_saves()
        .into_iter()
        .filter_map(|s| s.trigger)
        .collect();
    assert_eq!(triggers, vec!["act_one_end", "first_trial_checkpoint"]);
}

#[test]
fn test_story_walkthrough() {
    let (mut session, _) = session();
    session.trigger_story_event("game_start").unwrap();
    session.trigger_story_event("tutorial_intro").unwrap();

    match session.trigger_story_event("meet_mentor").unwrap() {
        TriggerOutcome::AwaitingChoice { choices, .. } => assert_eq!(choices.len(), 2),
        other => panic!("expected a branch, got {:?}", other),
    }
    let choice = session.select_choice("meet_mentor", 0).unwrap();
    let next = choice.next_event().unwrap().to_string();

    let outcome = session.trigger_story_event(&next).unwrap();
    assert_eq!(outcome.next_event(), Some("first_trial"));
    assert!(session.check_power_availability("telekinesis"));

    session.trigger_story_event("first_trial").unwrap();
    session.trigger_story_event("first_trial_cleared").unwrap();
    assert_eq!(session.power_state("time_slow"), Some(PowerState::Ready));

    let progress = session.get_story_progress();
    assert_eq!(progress.checkpoints_reached, 2);
    assert!(progress.event_ratio() > 0.5);
    assert_eq!(session.auto_save_count(), 2);
}

#[test]
fn test_saves_survive_sessions_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        save_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let mut first = GameSession::new(config.clone()).unwrap();
    first.unlock_power("telekinesis", "test_trigger").unwrap();
    first.set_extra_context(json!({"position": [10, 20]}));
    first.manual_save(3).unwrap();
    drop(first);

    let mut second = GameSession::with_parts(
        &config,
        &DataSource::Embedded,
        Box::new(DirectoryStore::open(dir.path()).unwrap()),
        Arc::new(ManualClock::new(0)),
    );
    let saves = second.get_available_saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].key, "manual-3");

    let loaded = second.load_game("manual-3").unwrap();
    assert_eq!(loaded.extra, json!({"position": [10, 20]}));
    assert!(second.check_power_availability("telekinesis"));
}

#[test]
fn test_missing_story_file_falls_back() {
    let config = SessionConfig {
        story_data: Some("/definitely/not/here.json".into()),
        ..Default::default()
    };
    let mut session = GameSession::new(config).unwrap();

    assert_eq!(session.story().origin(), story_rules::DataOrigin::Fallback);
    assert!(session.trigger_story_event("game_start").is_ok());
}
