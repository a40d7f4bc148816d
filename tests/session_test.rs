//! Session behavior under a paused clock: tick cadence, flush points,
//! serialization of operations and the emergency path.

use cultivation::breakthrough::{BreakthroughOutcome, BreakthroughPhase};
use cultivation::core::error::InvalidTransition;
use cultivation::session::spawn_session;
use cultivation::{
    Catalog, CultivationEngine, EngineConfig, EngineError, MemoryStore, PlayerRecord,
    ProgressionState, StorageError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn config() -> EngineConfig {
    EngineConfig::seeded(7)
}

fn add_player(store: &MemoryStore, user_id: &str, setup: impl FnOnce(&mut ProgressionState)) {
    let mut state = ProgressionState::new(user_id, "qi-condensation");
    setup(&mut state);
    store.insert(PlayerRecord::new(state));
}

fn store_with(user_id: &str, setup: impl FnOnce(&mut ProgressionState)) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    add_player(&store, user_id, setup);
    store
}

fn fresh(_: &mut ProgressionState) {}

fn engine_with(store: &Arc<MemoryStore>, config: EngineConfig) -> CultivationEngine {
    CultivationEngine::new(Catalog::builtin(), store.clone(), config)
}

/// Background writes land on the blocking pool; give them real time.
fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// =========================================================================
// Meditation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ten_seconds_of_meditation_without_method() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    let started = engine.start_meditation("alice").await.unwrap();
    assert!(started.is_meditating);
    sleep(Duration::from_millis(10_500)).await;
    let stopped = engine.stop_meditation("alice").await.unwrap();

    assert_eq!(stopped.spirit_power, 100);
    assert!(!stopped.is_meditating);

    // Stop is flushed before it returns
    let saved = store.get("alice").unwrap().progression;
    assert_eq!(saved.spirit_power, 100);
    assert!(!saved.is_meditating);
    assert_eq!(store.record_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_without_meditation() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.accrual_rate, 10);
    sleep(Duration::from_secs(30)).await;

    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.state.spirit_power, 0);
    assert_eq!(status.unflushed_ticks, 0);
    assert_eq!(store.total_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_persists_progress_while_meditating() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    sleep(Duration::from_millis(12_500)).await;

    // Newest autosave was taken at 10s, right after the tenth tick
    assert!(wait_until(|| store
        .get("alice")
        .map_or(false, |r| r.progression.spirit_power == 100)));
    let saved = store.get("alice").unwrap().progression;
    assert!(saved.is_meditating);
    assert_eq!(store.record_writes(), 0);

    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.state.spirit_power, 120);
    assert_eq!(status.unflushed_ticks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stored_meditation_resumes_without_catch_up() {
    let store = store_with("alice", |s| {
        s.is_meditating = true;
        s.last_update_time -= 3600;
    });
    let engine = engine_with(&store, config());

    engine.session("alice").unwrap();
    sleep(Duration::from_millis(3_500)).await;

    let status = engine.status("alice").await.unwrap();
    assert!(status.state.is_meditating);
    assert_eq!(status.state.spirit_power, 30);
}

#[tokio::test(start_paused = true)]
async fn test_meditation_log_keeps_newest_lines() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    sleep(Duration::from_secs(600)).await;

    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.log.len(), 5);
    assert!(status.log.iter().all(|line| line.contains("spirit stones")));
    assert!(status.state.spirit_stones > 0);
}

#[tokio::test(start_paused = true)]
async fn test_host_hidden_flushes_current_meditation() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    assert!(wait_until(|| store.snapshot_writes() == 1));
    sleep(Duration::from_millis(2_500)).await;
    engine.host_hidden("alice").await.unwrap();

    assert!(wait_until(|| store.snapshot_writes() == 2));
    let saved = store.get("alice").unwrap().progression;
    assert_eq!(saved.spirit_power, 20);
    assert!(saved.is_meditating);
    assert_eq!(store.record_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_host_hidden_while_idle_writes_nothing() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    engine.host_hidden("alice").await.unwrap();
    sleep(Duration::from_millis(100)).await;
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(store.total_writes(), 0);
}

// =========================================================================
// Breakthroughs
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ritual_excludes_ticks() {
    let store = store_with("alice", |s| s.spirit_power = 1500);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    let begun = Instant::now();
    let report = engine.attempt_breakthrough("alice").await.unwrap();

    assert!(begun.elapsed() >= config().ritual_duration());
    assert_eq!(
        report.resolution.outcome,
        BreakthroughOutcome::MinorSuccess {
            new_level: 2,
            power_spent: 1500,
        }
    );
    // Nothing accrued between the plan and the resolution
    assert_eq!(report.state.spirit_power, 0);
    assert_eq!(report.state.current_level, 2);
    assert_eq!(report.phase, BreakthroughPhase::Idle);
    assert_eq!(store.get("alice").unwrap().progression, report.state);
}

#[tokio::test(start_paused = true)]
async fn test_operations_wait_for_the_ritual() {
    let store = store_with("alice", |s| s.spirit_power = 1500);
    let engine = engine_with(&store, config());
    let handle = engine.session("alice").unwrap();
    let begun = Instant::now();

    let (attempt, status) = tokio::join!(handle.attempt_breakthrough(), async {
        tokio::task::yield_now().await;
        let status = handle.status().await;
        (status, begun.elapsed())
    });

    assert!(attempt.unwrap().resolution.outcome.is_success());
    let (status, waited) = status;
    let status = status.unwrap();
    assert!(waited >= config().ritual_duration());
    assert_eq!(status.state.current_level, 2);
    assert_eq!(status.phase, BreakthroughPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_rejects_with_concurrency_violation() {
    let store = store_with("alice", |s| s.spirit_power = 1500);
    let engine = engine_with(
        &store,
        EngineConfig {
            command_queue_capacity: 1,
            ..config()
        },
    );
    let handle = engine.session("alice").unwrap();

    let ritual = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.attempt_breakthrough().await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    let queued = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.status().await })
    };
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(
        handle.purchase_method("breathing-art").await,
        Err(EngineError::ConcurrencyViolation { .. })
    ));

    assert!(ritual.await.unwrap().is_ok());
    assert_eq!(queued.await.unwrap().unwrap().state.current_level, 2);
}

#[tokio::test(start_paused = true)]
async fn test_underpowered_attempt_is_rejected_without_ritual() {
    let store = store_with("alice", |s| s.spirit_power = 1499);
    let engine = engine_with(&store, config());
    let begun = Instant::now();

    assert!(matches!(
        engine.attempt_breakthrough("alice").await,
        Err(EngineError::InsufficientResource { .. })
    ));
    assert!(begun.elapsed() < config().ritual_duration());
    assert_eq!(store.total_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_max_tier_rejects_attempts() {
    let store = store_with("alice", |s| {
        s.tier_id = "tribulation-transcendence".to_string();
        s.current_level = 9;
        s.spirit_power = u64::MAX / 2;
    });
    let engine = engine_with(&store, config());

    assert!(matches!(
        engine.attempt_breakthrough("alice").await,
        Err(EngineError::InvalidTransition(InvalidTransition::MaxTier))
    ));
    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.phase, BreakthroughPhase::MaxTier);
    assert!(status.breakthrough.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_last_minor_step_of_final_tier_reaches_max_tier() {
    let store = store_with("alice", |s| {
        s.tier_id = "tribulation-transcendence".to_string();
        s.current_level = 8;
        s.spirit_power = u64::MAX / 2;
    });
    let engine = engine_with(&store, config());

    let report = engine.attempt_breakthrough("alice").await.unwrap();
    assert!(matches!(
        report.resolution.outcome,
        BreakthroughOutcome::MinorSuccess { new_level: 9, .. }
    ));
    assert_eq!(report.phase, BreakthroughPhase::MaxTier);
    assert_eq!(report.state.current_level, 9);
    assert_eq!(store.get("alice").unwrap().progression, report.state);

    assert!(matches!(
        engine.attempt_breakthrough("alice").await,
        Err(EngineError::InvalidTransition(InvalidTransition::MaxTier))
    ));
    assert_eq!(
        engine.status("alice").await.unwrap().phase,
        BreakthroughPhase::MaxTier
    );
}

#[tokio::test(start_paused = true)]
async fn test_major_attempt_is_persisted() {
    let store = store_with("alice", |s| {
        s.current_level = 9;
        s.spirit_power = 60_000;
        s.breakthrough_bonus = 20;
    });
    let engine = engine_with(&store, config());

    let report = engine.attempt_breakthrough("alice").await.unwrap();
    assert!(report.resolution.plan.is_major());
    assert_eq!(report.resolution.plan.success_rate, 50);
    match &report.resolution.outcome {
        BreakthroughOutcome::MajorSuccess { new_tier_id } => {
            assert_eq!(new_tier_id, "foundation-establishment");
            assert_eq!(report.state.breakthrough_bonus, 0);
        }
        BreakthroughOutcome::Failure { .. } => {
            assert_eq!(report.state.current_level, 8);
            assert_eq!(report.state.spirit_power, 30_000);
            assert_eq!(report.state.breakthrough_bonus, 25);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(store.get("alice").unwrap().progression, report.state);
    assert_eq!(store.record_writes(), 1);
}

// =========================================================================
// Methods
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_method_operations_persist_debit_with_change() {
    let store = store_with("alice", |s| s.spirit_stones = 1_000);
    let engine = engine_with(&store, config());

    let common = engine.purchase_method("alice", "breathing-art").await.unwrap();
    let uncommon = engine.purchase_method("alice", "flowing-cloud").await.unwrap();
    assert_eq!(uncommon.state.spirit_stones, 1_000 - 10 - 100);

    let saved = store.get("alice").unwrap();
    assert_eq!(saved.progression.spirit_stones, 890);
    assert_eq!(saved.methods.len(), 2);

    engine
        .activate_method("alice", &common.change.method.id)
        .await
        .unwrap();
    let report = engine
        .activate_method("alice", &uncommon.change.method.id)
        .await
        .unwrap();
    assert_eq!(report.methods.iter().filter(|m| m.is_active).count(), 1);

    let saved = store.get("alice").unwrap();
    assert_eq!(saved.active_count(), 1);
    assert_eq!(
        saved.active().map(|m| m.method_id.as_str()),
        Some("flowing-cloud")
    );

    let upgraded = engine
        .upgrade_method("alice", &uncommon.change.method.id)
        .await
        .unwrap();
    assert_eq!(upgraded.change.stones_spent, 20);
    assert_eq!(upgraded.change.method.current_level, 2);

    // 10 × 1.5 × 1.1
    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.accrual_rate, 16);
    assert_eq!(store.record_writes(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_purchase_writes_nothing() {
    let store = store_with("alice", |s| s.spirit_stones = 2_000);
    let engine = engine_with(&store, config());

    assert!(matches!(
        engine.purchase_method("alice", "nine-suns").await,
        Err(EngineError::InsufficientResource { .. })
    ));
    assert!(matches!(
        engine.purchase_method("alice", "no-such-method").await,
        Err(EngineError::UnknownMethod(_))
    ));
    assert_eq!(store.total_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_meditation_speed_follows_active_method() {
    let store = store_with("alice", |s| s.spirit_stones = 10_000);
    let engine = engine_with(&store, config());

    let bought = engine.purchase_method("alice", "azure-dragon").await.unwrap();
    engine
        .activate_method("alice", &bought.change.method.id)
        .await
        .unwrap();

    engine.start_meditation("alice").await.unwrap();
    sleep(Duration::from_millis(3_500)).await;
    let stopped = engine.stop_meditation("alice").await.unwrap();
    assert_eq!(stopped.spirit_power, 60);
}

// =========================================================================
// Persistence failures and shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_retried_by_next_autosave() {
    let store = store_with("alice", |s| s.spirit_stones = 100);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    store.set_fail_writes(true);
    let report = engine.purchase_method("alice", "breathing-art").await.unwrap();
    assert_eq!(report.state.spirit_stones, 90);
    assert!(store.get("alice").unwrap().methods.is_empty());

    store.set_fail_writes(false);
    sleep(Duration::from_millis(5_500)).await;

    let saved = store.get("alice").unwrap();
    assert_eq!(saved.methods.len(), 1);
    assert_eq!(store.record_writes(), 1);
    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.unflushed_ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_emergency_flush_writes_last_state_as_not_meditating() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());

    engine.start_meditation("alice").await.unwrap();
    sleep(Duration::from_millis(3_500)).await;
    engine.emergency_flush("alice");

    assert!(wait_until(|| store.get("alice").map_or(false, |r| {
        r.progression.spirit_power == 30 && !r.progression.is_meditating
    })));
}

#[tokio::test(start_paused = true)]
async fn test_emergency_flush_ends_the_session() {
    let store = store_with("alice", fresh);
    let engine = engine_with(&store, config());
    let handle = engine.session("alice").unwrap();

    engine.start_meditation("alice").await.unwrap();
    sleep(Duration::from_millis(3_500)).await;
    engine.emergency_flush("alice");

    // Well past the next autosave: nothing may write "meditating" back
    sleep(Duration::from_secs(6)).await;
    assert!(wait_until(|| store.get("alice").map_or(false, |r| {
        r.progression.spirit_power == 30 && !r.progression.is_meditating
    })));
    sleep(Duration::from_secs(6)).await;
    std::thread::sleep(Duration::from_millis(20));
    let saved = store.get("alice").unwrap().progression;
    assert_eq!(saved.spirit_power, 30);
    assert!(!saved.is_meditating);

    assert!(handle.is_closed());
    assert!(matches!(
        handle.status().await,
        Err(EngineError::SessionClosed(_))
    ));

    // The next call opens a fresh session from storage
    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.state.spirit_power, 30);
    assert!(!status.state.is_meditating);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_session_stops_meditating_in_storage() {
    let store = store_with("alice", fresh);
    let record = store.get("alice").unwrap();
    let handle = spawn_session(record, Arc::new(Catalog::builtin()), store.clone(), config());

    handle.start_meditation().await.unwrap();
    sleep(Duration::from_millis(2_500)).await;
    drop(handle);
    sleep(Duration::from_millis(10)).await;

    let saved = store.get("alice").unwrap().progression;
    assert!(!saved.is_meditating);
    assert_eq!(saved.spirit_power, 20);
    assert_eq!(store.record_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_every_session() {
    let store = store_with("alice", fresh);
    add_player(&store, "bob", fresh);
    let engine = engine_with(&store, config());
    let alice = engine.session("alice").unwrap();

    engine.start_meditation("alice").await.unwrap();
    engine.start_meditation("bob").await.unwrap();
    sleep(Duration::from_millis(2_500)).await;
    engine.shutdown().await;

    for user_id in ["alice", "bob"] {
        let saved = store.get(user_id).unwrap().progression;
        assert!(!saved.is_meditating, "{}", user_id);
        assert_eq!(saved.spirit_power, 20, "{}", user_id);
    }
    assert!(matches!(
        alice.status().await,
        Err(EngineError::SessionClosed(_))
    ));

    // A later call reopens from storage
    let status = engine.status("alice").await.unwrap();
    assert_eq!(status.state.spirit_power, 20);
    assert!(!status.state.is_meditating);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_player_and_tier() {
    let store = store_with("lost", |s| s.tier_id = "mortal-realm".to_string());
    let engine = engine_with(&store, config());

    assert!(matches!(
        engine.start_meditation("nobody").await,
        Err(EngineError::UnknownPlayer(_))
    ));
    assert!(matches!(
        engine.start_meditation("lost").await,
        Err(EngineError::UnknownTier(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_stored_record_is_refused() {
    let store = store_with("greedy", |s| s.breakthrough_bonus = 150);
    add_player(&store, "skipper", |s| s.current_level = 12);
    let engine = engine_with(&store, config());

    for user_id in ["greedy", "skipper"] {
        assert!(matches!(
            engine.status(user_id).await,
            Err(EngineError::PersistenceFailure(StorageError::Corrupt(_)))
        ));
    }
    assert_eq!(store.total_writes(), 0);
}
