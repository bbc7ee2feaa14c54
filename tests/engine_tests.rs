use std::sync::Arc;
use std::time::Duration;

use taskwarden::autolaunch::MemoryAutoLaunch;
use taskwarden::config::Profile;
use taskwarden::error::Result;
use taskwarden::lockdown::{CLEANUP_DELAY_MS, EngineHandle, LockState, LockdownEngine};
use taskwarden::shortcuts::MemoryRegistrar;
use taskwarden::store::MemoryStore;
use taskwarden::surface::{MemorySurface, SurfaceId, SurfaceOp};

struct Harness {
    surface: Arc<MemorySurface>,
    registrar: Arc<MemoryRegistrar>,
    autolaunch: Arc<MemoryAutoLaunch>,
    handle: EngineHandle,
    engine_task: tokio::task::JoinHandle<Result<()>>,
}

fn start_engine(profile: Profile) -> Harness {
    let surface = Arc::new(MemorySurface::new());
    let registrar = Arc::new(MemoryRegistrar::new());
    let autolaunch = Arc::new(MemoryAutoLaunch::new());
    let (engine, handle) = LockdownEngine::new(
        profile,
        surface.clone(),
        registrar.clone(),
        Arc::new(MemoryStore::new()),
        autolaunch.clone(),
    );
    let engine_task = tokio::spawn(engine.run());
    Harness {
        surface,
        registrar,
        autolaunch,
        handle,
        engine_task,
    }
}

/// Let queued engine work drain without moving the clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn corrective_sequence(id: SurfaceId) -> Vec<SurfaceOp> {
    vec![
        SurfaceOp::Focus(id),
        SurfaceOp::Show(id),
        SurfaceOp::Raise(id),
        SurfaceOp::Pin(id, true),
        SurfaceOp::Attention(id, true),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_startup_locks_with_surface_and_shortcuts() {
    let h = start_engine(Profile::prod());
    settle().await;

    assert_eq!(h.handle.state(), LockState::Locked);
    assert_eq!(h.surface.live_count(), 1);
    assert_eq!(h.registrar.registered().len(), 11);
    assert_eq!(h.autolaunch.enable_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dev_profile_skips_auto_launch() {
    let h = start_engine(Profile::dev());
    settle().await;

    assert_eq!(h.autolaunch.enable_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unlock_hides_then_relocks_after_window() {
    let h = start_engine(Profile::dev());
    settle().await;
    let id = h.surface.live_ids()[0];
    h.surface.take_ops();

    h.handle.unlock().unwrap();
    settle().await;
    assert_eq!(h.handle.state(), LockState::TemporarilyUnlocked);
    assert_eq!(h.surface.take_ops(), vec![SurfaceOp::Hide(id)]);

    tokio::time::sleep(Duration::from_millis(4_999)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::TemporarilyUnlocked);

    tokio::time::sleep(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::Locked);
    assert_eq!(
        h.surface.take_ops(),
        vec![SurfaceOp::Show(id), SurfaceOp::Focus(id)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unlock_is_idempotent_while_unlocked() {
    let h = start_engine(Profile::dev());
    settle().await;
    let id = h.surface.live_ids()[0];
    h.surface.take_ops();

    h.handle.unlock().unwrap();
    settle().await;
    h.handle.unlock().unwrap();
    settle().await;
    assert_eq!(h.handle.state(), LockState::TemporarilyUnlocked);
    assert_eq!(h.surface.take_ops(), vec![SurfaceOp::Hide(id)]);

    tokio::time::sleep(Duration::from_millis(5_001)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::Locked);
    let shows = h
        .surface
        .take_ops()
        .into_iter()
        .filter(|op| matches!(op, SurfaceOp::Show(_)))
        .count();
    assert_eq!(shows, 1);

    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(h.handle.state(), LockState::Locked);
}

#[tokio::test(start_paused = true)]
async fn test_quit_on_complete_terminates_with_cleanup() {
    let h = start_engine(Profile::prod());
    settle().await;

    h.handle.unlock().unwrap();
    settle().await;
    assert_eq!(h.handle.state(), LockState::Terminating);
    assert_eq!(h.surface.live_count(), 0);
    assert!(h.registrar.registered().is_empty());
    assert_eq!(h.registrar.release_calls(), 1);
    assert_eq!(h.autolaunch.disable_calls(), 1);

    // A second unlock during teardown changes nothing.
    h.handle.unlock().unwrap();
    settle().await;
    assert_eq!(h.handle.state(), LockState::Terminating);
    assert_eq!(h.autolaunch.disable_calls(), 1);

    tokio::time::sleep(Duration::from_millis(CLEANUP_DELAY_MS)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::Terminated);

    let result = h.engine_task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(h.autolaunch.disable_calls(), 1);

    let creates = h
        .surface
        .ops()
        .into_iter()
        .filter(|op| matches!(op, SurfaceOp::Create(_)))
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_while_locked_is_a_no_op() {
    let h = start_engine(Profile::dev());
    settle().await;
    let states = h.handle.subscribe_state();
    h.surface.take_ops();

    h.handle.reset_session().unwrap();
    settle().await;

    assert_eq!(h.handle.state(), LockState::Locked);
    assert!(h.surface.take_ops().is_empty());
    assert!(!states.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_reset_relocks_early_and_cancels_the_relock_timer() {
    let h = start_engine(Profile::dev());
    settle().await;
    let id = h.surface.live_ids()[0];

    h.handle.unlock().unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    h.surface.take_ops();

    h.handle.reset_session().unwrap();
    settle().await;
    assert_eq!(h.handle.state(), LockState::Locked);
    assert_eq!(
        h.surface.take_ops(),
        vec![SurfaceOp::Show(id), SurfaceOp::Focus(id)]
    );

    // Past where the cancelled deadline would have fired: no second
    // show, no churn.
    tokio::time::sleep(Duration::from_millis(6_000)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::Locked);
    assert!(h.surface.take_ops().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_focus_guard_corrects_once_per_tick_until_regained() {
    let mut profile = Profile::dev();
    profile.focus_monitor_interval_ms = 1_500;
    let h = start_engine(profile);
    settle().await;
    let id = h.surface.live_ids()[0];
    h.surface.take_ops();

    h.surface.hold_focus_away(true);

    tokio::time::sleep(Duration::from_millis(1_501)).await;
    settle().await;
    assert_eq!(h.surface.take_ops(), corrective_sequence(id));

    // The attention cue self-clears 1000ms after the correction,
    // independent of the tick interval.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    settle().await;
    assert_eq!(h.surface.take_ops(), vec![SurfaceOp::Attention(id, false)]);

    tokio::time::sleep(Duration::from_millis(501)).await;
    settle().await;
    assert_eq!(h.surface.take_ops(), corrective_sequence(id));

    h.surface.hold_focus_away(false);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;
    let mut expected = vec![SurfaceOp::Attention(id, false)];
    expected.extend(corrective_sequence(id));
    assert_eq!(h.surface.take_ops(), expected);
    assert_eq!(h.surface.focused(), Some(id));

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    settle().await;
    assert_eq!(h.surface.take_ops(), vec![SurfaceOp::Attention(id, false)]);

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    settle().await;
    assert!(h.surface.take_ops().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_focus_guard_stops_during_temporary_unlock() {
    let h = start_engine(Profile::dev());
    settle().await;

    h.handle.unlock().unwrap();
    settle().await;
    h.surface.take_ops();
    h.surface.hold_focus_away(true);

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    settle().await;
    assert!(
        !h.surface
            .take_ops()
            .iter()
            .any(|op| matches!(op, SurfaceOp::Focus(_)))
    );
    assert_eq!(h.handle.state(), LockState::TemporarilyUnlocked);
}

#[tokio::test(start_paused = true)]
async fn test_second_instance_focuses_without_transition() {
    let h = start_engine(Profile::prod());
    settle().await;
    let states = h.handle.subscribe_state();
    let id = h.surface.live_ids()[0];
    h.surface.take_ops();

    h.handle.notify_second_instance().unwrap();
    settle().await;

    assert_eq!(
        h.surface.take_ops(),
        vec![SurfaceOp::Focus(id), SurfaceOp::Show(id)]
    );
    assert!(!states.has_changed().unwrap());
    assert_eq!(h.handle.state(), LockState::Locked);
}

#[tokio::test(start_paused = true)]
async fn test_user_close_is_prevented_on_prod_surface() {
    let h = start_engine(Profile::prod());
    settle().await;
    let id = h.surface.live_ids()[0];
    h.surface.take_ops();

    assert!(!h.surface.simulate_user_close(id));
    settle().await;

    assert_eq!(h.surface.live_count(), 1);
    assert_eq!(h.surface.take_ops(), vec![SurfaceOp::ClosePrevented(id)]);
    assert_eq!(h.handle.state(), LockState::Locked);
}

#[tokio::test(start_paused = true)]
async fn test_messages_after_termination_are_ignored() {
    let h = start_engine(Profile::prod());
    settle().await;

    h.handle.unlock().unwrap();
    tokio::time::sleep(Duration::from_millis(CLEANUP_DELAY_MS)).await;
    settle().await;
    assert_eq!(h.handle.state(), LockState::Terminated);
    h.engine_task.await.unwrap().unwrap();

    assert!(h.handle.unlock().is_err());
    assert!(h.handle.reset_session().is_err());
    assert!(h.handle.get_tasks().await.is_err());
}
