//! The lockdown engine event loop.
//!
//! One task owns all mutable state. Events arrive on a single unbounded
//! queue and each is processed to completion, side effects awaited
//! inline, before the next is dequeued. Helper tasks (deadlines, the
//! focus monitor, the surface event forwarder) only ever send onto the
//! queue.
//!
//! Every state transition bumps an epoch counter. Timer events carry
//! the epoch they were scheduled under and are dropped on mismatch, so a
//! deadline that raced a transition cannot act on a state that no longer
//! exists. Surface replacement keeps the epoch: a relock deadline must
//! survive a respawn that happens mid-window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::autolaunch::{self, AutoLaunchService};
use crate::config::Profile;
use crate::error::{Result, WardenError};
use crate::shortcuts::ShortcutRegistrar;
use crate::store::KeyValueStore;
use crate::surface::{SurfaceEvent, SurfaceId, SurfaceOptions, SurfaceProvider};
use crate::tasks::{Task, TaskBook};

use super::events::{EngineEvent, SurfaceMessage};
use super::focus_guard::FocusMonitor;
use super::interceptor::ShortcutInterceptor;
use super::machine::LockState;
use super::respawn::RespawnSupervisor;
use super::timer::Deadline;

/// Grace period between teardown and final termination.
pub const CLEANUP_DELAY_MS: u64 = 500;

/// How long the attention cue stays lit after a focus correction.
pub const ATTENTION_FLASH_MS: u64 = 1_000;

/// Client side of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
    state_rx: watch::Receiver<LockState>,
}

impl EngineHandle {
    pub fn send(&self, message: SurfaceMessage) -> Result<()> {
        self.tx
            .send(EngineEvent::Message(message))
            .map_err(|_| WardenError::EngineClosed)
    }

    pub fn unlock(&self) -> Result<()> {
        self.send(SurfaceMessage::Unlock)
    }

    pub fn reset_session(&self) -> Result<()> {
        self.send(SurfaceMessage::ResetSession)
    }

    pub async fn get_tasks(&self) -> Result<Vec<Task>> {
        let (reply, rx) = oneshot::channel();
        self.send(SurfaceMessage::GetTasks { reply })?;
        rx.await.map_err(|_| WardenError::EngineClosed)
    }

    pub fn save_tasks(&self, tasks: Vec<Task>) -> Result<()> {
        self.send(SurfaceMessage::SaveTasks { tasks })
    }

    /// Tell the engine another launch of the app bounced off the
    /// instance lock.
    pub fn notify_second_instance(&self) -> Result<()> {
        self.tx
            .send(EngineEvent::SecondInstance)
            .map_err(|_| WardenError::EngineClosed)
    }

    /// Current lock state snapshot.
    pub fn state(&self) -> LockState {
        *self.state_rx.borrow()
    }

    /// Watch lock state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<LockState> {
        self.state_rx.clone()
    }
}

/// The engine proper. Construct with [`LockdownEngine::new`], then drive
/// it with [`run`](LockdownEngine::run), which returns when the session
/// reaches `Terminated` or the surface cannot be maintained.
pub struct LockdownEngine {
    profile: Profile,
    provider: Arc<dyn SurfaceProvider>,
    autolaunch: Arc<dyn AutoLaunchService>,
    interceptor: ShortcutInterceptor,
    tasks: TaskBook,

    state: LockState,
    epoch: u64,
    surface: Option<SurfaceId>,

    tx: mpsc::UnboundedSender<EngineEvent>,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
    state_tx: watch::Sender<LockState>,

    focus_monitor: Option<FocusMonitor>,
    relock: Option<Deadline>,
    attention_clear: Option<Deadline>,
    cleanup: Option<Deadline>,
    respawn: RespawnSupervisor,
}

impl LockdownEngine {
    pub fn new(
        profile: Profile,
        provider: Arc<dyn SurfaceProvider>,
        registrar: Arc<dyn ShortcutRegistrar>,
        store: Arc<dyn KeyValueStore>,
        autolaunch: Arc<dyn AutoLaunchService>,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LockState::Locked);
        let respawn = RespawnSupervisor::new(profile.respawn_delay());

        let engine = Self {
            profile,
            provider,
            autolaunch,
            interceptor: ShortcutInterceptor::new(registrar),
            tasks: TaskBook::new(store),
            state: LockState::Locked,
            epoch: 0,
            surface: None,
            tx: tx.clone(),
            rx,
            state_tx,
            focus_monitor: None,
            relock: None,
            attention_clear: None,
            cleanup: None,
            respawn,
        };
        let handle = EngineHandle { tx, state_rx };
        (engine, handle)
    }

    /// Run the lockdown to completion.
    ///
    /// Returns `Ok(())` after a clean `Terminated`, or the creation error
    /// when a surface cannot be brought up, which is the one condition
    /// this engine cannot enforce through.
    pub async fn run(mut self) -> Result<()> {
        info!(profile = %self.profile.kind, "Lockdown engine starting");

        let mut surface_events = self.provider.subscribe();
        let forward_tx = self.tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = surface_events.recv().await {
                if forward_tx.send(EngineEvent::Surface(event)).is_err() {
                    break;
                }
            }
        });

        if let Err(e) = self.startup().await {
            error!(error = %e, "Startup failed");
            self.interceptor.release();
            forwarder.abort();
            return Err(e);
        }

        let outcome = loop {
            let Some(event) = self.rx.recv().await else {
                break Ok(());
            };
            if let Err(e) = self.handle_event(event).await {
                if matches!(e, WardenError::SurfaceCreation(_)) {
                    error!(error = %e, "Cannot maintain a surface, shutting down");
                    self.interceptor.release();
                    break Err(e);
                }
                warn!(error = %e, "Event handling failed");
            }
            if self.state.is_terminal() {
                break Ok(());
            }
        };

        forwarder.abort();
        info!("Lockdown engine stopped");
        outcome
    }

    async fn startup(&mut self) -> Result<()> {
        if self.profile.disable_auto_launch {
            info!("Auto-launch disabled by profile");
        } else {
            autolaunch::ensure_enabled(self.autolaunch.as_ref()).await;
        }
        self.interceptor.engage();
        self.create_surface().await?;
        self.start_focus_monitor();
        Ok(())
    }

    async fn handle_event(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::Message(message) => self.handle_message(message).await,
            EngineEvent::Surface(event) => self.handle_surface_event(event).await,
            EngineEvent::RelockDue { epoch } => self.handle_relock(epoch).await,
            EngineEvent::CleanupDue => self.handle_cleanup(),
            EngineEvent::RespawnDue { epoch } => self.handle_respawn(epoch).await,
            EngineEvent::FocusTick { epoch } => self.handle_focus_tick(epoch).await,
            EngineEvent::AttentionClear { epoch } => self.handle_attention_clear(epoch).await,
            EngineEvent::SecondInstance => self.handle_second_instance().await,
        }
    }

    async fn handle_message(&mut self, message: SurfaceMessage) -> Result<()> {
        match message {
            SurfaceMessage::Unlock => self.handle_unlock().await,
            SurfaceMessage::ResetSession => self.handle_reset().await,
            SurfaceMessage::GetTasks { reply } => {
                let tasks = self.tasks.load().await;
                if reply.send(tasks).is_err() {
                    debug!("Task requester went away before the reply");
                }
                Ok(())
            }
            SurfaceMessage::SaveTasks { tasks } => {
                if let Err(e) = self.tasks.save(&tasks).await {
                    warn!(error = %e, count = tasks.len(), "Could not persist tasks");
                }
                Ok(())
            }
        }
    }

    async fn handle_unlock(&mut self) -> Result<()> {
        if self.state != LockState::Locked {
            debug!(state = %self.state, "Ignoring unlock outside Locked");
            return Ok(());
        }
        info!("All tasks complete, processing unlock request");
        self.transition(LockState::Unlocking, "unlock requested")?;

        if self.profile.quit_on_complete {
            self.begin_termination().await
        } else {
            self.begin_temporary_unlock().await
        }
    }

    async fn begin_temporary_unlock(&mut self) -> Result<()> {
        self.transition(LockState::TemporarilyUnlocked, "temporary unlock")?;
        self.focus_monitor = None;
        self.attention_clear = None;

        if let Some(id) = self.surface
            && let Err(e) = self.provider.hide(id).await
        {
            warn!(surface = %id, error = %e, "Could not hide surface");
        }

        self.relock = Some(Deadline::spawn(
            self.profile.unlock_duration(),
            self.tx.clone(),
            EngineEvent::RelockDue { epoch: self.epoch },
        ));
        info!(
            duration_ms = self.profile.unlock_duration_ms,
            "Surface hidden for the unlock window"
        );
        Ok(())
    }

    async fn begin_termination(&mut self) -> Result<()> {
        self.transition(LockState::Terminating, "quit on complete")?;
        info!("Shutting down, all tasks complete");
        self.stop_enforcement();

        if let Err(e) = self.autolaunch.disable().await {
            warn!(error = %e, "Could not disable auto-launch");
        }
        self.interceptor.release();

        if let Some(id) = self.surface.take()
            && let Err(e) = self.provider.destroy(id).await
        {
            debug!(surface = %id, error = %e, "Surface already gone during teardown");
        }

        self.cleanup = Some(Deadline::spawn(
            Duration::from_millis(CLEANUP_DELAY_MS),
            self.tx.clone(),
            EngineEvent::CleanupDue,
        ));
        Ok(())
    }

    fn handle_cleanup(&mut self) -> Result<()> {
        if self.state != LockState::Terminating {
            debug!(state = %self.state, "Ignoring cleanup outside Terminating");
            return Ok(());
        }
        self.cleanup = None;
        self.transition(LockState::Terminated, "cleanup complete")
    }

    async fn handle_relock(&mut self, epoch: u64) -> Result<()> {
        if self.is_stale(epoch, "relock") {
            return Ok(());
        }
        self.relock = None;
        self.relock_now("unlock window elapsed").await
    }

    async fn handle_reset(&mut self) -> Result<()> {
        match self.state {
            LockState::TemporarilyUnlocked => {
                self.relock = None;
                self.relock_now("session reset").await
            }
            LockState::Locked => {
                debug!("Session reset while already locked, nothing to do");
                Ok(())
            }
            _ => {
                debug!(state = %self.state, "Ignoring session reset");
                Ok(())
            }
        }
    }

    /// Leave `TemporarilyUnlocked` for `Locked` and re-establish the
    /// enforcement pieces that go with it.
    async fn relock_now(&mut self, reason: &str) -> Result<()> {
        self.transition(LockState::Locked, reason)?;
        self.respawn.clear();

        match self.surface {
            Some(id) => {
                if let Err(e) = self.provider.show(id).await {
                    warn!(surface = %id, error = %e, "Could not show surface");
                }
                if let Err(e) = self.provider.focus(id).await {
                    warn!(surface = %id, error = %e, "Could not focus surface");
                }
            }
            None => {
                self.create_surface().await?;
            }
        }

        self.start_focus_monitor();
        Ok(())
    }

    async fn handle_surface_event(&mut self, event: SurfaceEvent) -> Result<()> {
        match event {
            SurfaceEvent::Closed { id } => self.handle_surface_closed(id).await,
            SurfaceEvent::Blurred { id } => {
                debug!(surface = %id, "Surface blurred");
                Ok(())
            }
            SurfaceEvent::Minimized { id } => {
                debug!(surface = %id, "Surface minimized");
                Ok(())
            }
            SurfaceEvent::Hidden { id } => {
                debug!(surface = %id, "Surface hidden");
                Ok(())
            }
        }
    }

    async fn handle_surface_closed(&mut self, id: SurfaceId) -> Result<()> {
        if self.surface != Some(id) {
            debug!(surface = %id, "Close event for a surface we no longer track");
            return Ok(());
        }
        self.surface = None;

        if !self.state.respawns_surface() {
            debug!(state = %self.state, "Surface closed, no respawn in this state");
            return Ok(());
        }

        warn!(surface = %id, state = %self.state, "Surface destroyed unexpectedly, scheduling respawn");
        self.respawn.schedule(self.epoch, &self.tx);
        Ok(())
    }

    async fn handle_respawn(&mut self, epoch: u64) -> Result<()> {
        self.respawn.clear();
        if self.is_stale(epoch, "respawn") {
            return Ok(());
        }
        if !self.state.respawns_surface() || self.surface.is_some() {
            debug!(state = %self.state, "Skipping respawn");
            return Ok(());
        }

        info!(state = %self.state, "Respawning surface");
        self.create_surface().await?;

        if self.state == LockState::TemporarilyUnlocked {
            if let Some(id) = self.surface
                && let Err(e) = self.provider.hide(id).await
            {
                warn!(surface = %id, error = %e, "Could not hide respawned surface");
            }
        } else {
            self.start_focus_monitor();
        }
        Ok(())
    }

    async fn handle_focus_tick(&mut self, epoch: u64) -> Result<()> {
        if self.is_stale(epoch, "focus") {
            return Ok(());
        }
        if !self.state.is_enforcing() {
            return Ok(());
        }
        let Some(id) = self.surface else {
            return Ok(());
        };

        match self.provider.is_focused(id).await {
            Ok(true) => Ok(()),
            Ok(false) => self.correct_focus(id).await,
            Err(e) => {
                debug!(surface = %id, error = %e, "Focus probe failed");
                Ok(())
            }
        }
    }

    /// One corrective pass: focus, show, raise, pin, in that order, then
    /// light the attention cue and arm its clear deadline.
    async fn correct_focus(&mut self, id: SurfaceId) -> Result<()> {
        debug!(surface = %id, "Focus lost, correcting");

        if let Err(e) = self.provider.focus(id).await {
            debug!(surface = %id, error = %e, "Corrective focus failed");
        }
        if let Err(e) = self.provider.show(id).await {
            debug!(surface = %id, error = %e, "Corrective show failed");
        }
        if let Err(e) = self.provider.raise(id).await {
            debug!(surface = %id, error = %e, "Corrective raise failed");
        }
        if let Err(e) = self.provider.pin(id, true).await {
            debug!(surface = %id, error = %e, "Corrective pin failed");
        }

        if let Err(e) = self.provider.set_attention(id, true).await {
            debug!(surface = %id, error = %e, "Attention cue failed");
        }
        self.attention_clear = Some(Deadline::spawn(
            Duration::from_millis(ATTENTION_FLASH_MS),
            self.tx.clone(),
            EngineEvent::AttentionClear { epoch: self.epoch },
        ));
        Ok(())
    }

    async fn handle_attention_clear(&mut self, epoch: u64) -> Result<()> {
        if self.is_stale(epoch, "attention") {
            return Ok(());
        }
        self.attention_clear = None;
        if let Some(id) = self.surface
            && let Err(e) = self.provider.set_attention(id, false).await
        {
            debug!(surface = %id, error = %e, "Could not clear attention cue");
        }
        Ok(())
    }

    async fn handle_second_instance(&mut self) -> Result<()> {
        info!("Second launch attempt, surfacing the existing instance");
        let Some(id) = self.surface else {
            return Ok(());
        };
        if let Err(e) = self.provider.focus(id).await {
            debug!(surface = %id, error = %e, "Could not focus for second instance");
        }
        if let Err(e) = self.provider.show(id).await {
            debug!(surface = %id, error = %e, "Could not show for second instance");
        }
        Ok(())
    }

    async fn create_surface(&mut self) -> Result<()> {
        let options = SurfaceOptions::for_profile(&self.profile);
        let id = self.provider.create(&options).await?;
        self.surface = Some(id);
        info!(surface = %id, "Surface created");
        Ok(())
    }

    fn start_focus_monitor(&mut self) {
        self.focus_monitor = Some(FocusMonitor::spawn(
            self.profile.focus_monitor_interval(),
            self.epoch,
            self.tx.clone(),
        ));
    }

    fn stop_enforcement(&mut self) {
        self.focus_monitor = None;
        self.relock = None;
        self.attention_clear = None;
        self.respawn.clear();
    }

    fn transition(&mut self, to: LockState, reason: &str) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(WardenError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        info!(from = %self.state, to = %to, reason, "Lock state transition");
        self.state = to;
        self.epoch += 1;
        let _ = self.state_tx.send(to);
        Ok(())
    }

    fn is_stale(&self, epoch: u64, timer: &'static str) -> bool {
        if epoch != self.epoch {
            debug!(
                timer,
                scheduled = epoch,
                current = self.epoch,
                "Dropping stale timer event"
            );
            return true;
        }
        false
    }
}
