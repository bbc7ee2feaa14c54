//! In-memory surface provider for tests.
//!
//! Records every call the engine makes so tests can assert on exact
//! corrective sequences, and offers levers for the failure modes a real
//! shell produces: refused creation, focus stolen by another app, and a
//! surface torn down behind the engine's back.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Result, WardenError};

use super::{SurfaceEvent, SurfaceId, SurfaceOptions, SurfaceProvider};

/// One recorded provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceOp {
    Create(SurfaceId),
    Destroy(SurfaceId),
    Show(SurfaceId),
    Hide(SurfaceId),
    Focus(SurfaceId),
    Raise(SurfaceId),
    Pin(SurfaceId, bool),
    Attention(SurfaceId, bool),
    /// A close request arrived while the surface was not closable.
    ClosePrevented(SurfaceId),
}

#[derive(Default)]
struct MemorySurfaceState {
    next_id: u64,
    live: HashMap<SurfaceId, SurfaceOptions>,
    focused: Option<SurfaceId>,
    ops: Vec<SurfaceOp>,
    last_options: Option<SurfaceOptions>,
    fail_create: bool,
    hold_focus_away: bool,
    subscribers: Vec<mpsc::UnboundedSender<SurfaceEvent>>,
}

impl MemorySurfaceState {
    fn broadcast(&mut self, event: SurfaceEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    fn remove(&mut self, id: SurfaceId) {
        self.live.remove(&id);
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.broadcast(SurfaceEvent::Closed { id });
    }
}

/// Surface provider double backed by a call log.
#[derive(Default)]
pub struct MemorySurface {
    inner: Mutex<MemorySurfaceState>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future `create` calls fail.
    pub fn fail_create(&self, on: bool) {
        self.inner.lock().fail_create = on;
    }

    /// Drop focus once. The next corrective `focus` call regains it
    /// unless [`hold_focus_away`](Self::hold_focus_away) is set.
    pub fn steal_focus(&self) {
        let mut state = self.inner.lock();
        if let Some(id) = state.focused.take() {
            state.broadcast(SurfaceEvent::Blurred { id });
        }
    }

    /// While set, no surface can gain focus. Models an application that
    /// keeps reclaiming focus as fast as the engine corrects it.
    pub fn hold_focus_away(&self, on: bool) {
        let mut state = self.inner.lock();
        state.hold_focus_away = on;
        if on && let Some(id) = state.focused.take() {
            state.broadcast(SurfaceEvent::Blurred { id });
        }
    }

    /// Minimize the surface from outside the engine.
    pub fn simulate_minimize(&self, id: SurfaceId) {
        let mut state = self.inner.lock();
        if state.live.contains_key(&id) {
            state.broadcast(SurfaceEvent::Minimized { id });
        }
    }

    /// Deliver a user close request. Returns whether the surface actually
    /// closed; a non-closable surface swallows the request.
    pub fn simulate_user_close(&self, id: SurfaceId) -> bool {
        let mut state = self.inner.lock();
        let closable = match state.live.get(&id) {
            Some(opts) => opts.closable,
            None => return false,
        };
        if !closable {
            state.ops.push(SurfaceOp::ClosePrevented(id));
            return false;
        }
        state.remove(id);
        true
    }

    /// Tear the surface down behind the engine's back, ignoring
    /// closability. Models a crash or an external force-destroy.
    pub fn simulate_crash(&self, id: SurfaceId) {
        let mut state = self.inner.lock();
        if state.live.contains_key(&id) {
            state.remove(id);
        }
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.inner.lock().ops.clone()
    }

    /// Drain the call log, returning everything recorded so far.
    pub fn take_ops(&self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.inner.lock().ops)
    }

    pub fn live_ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<_> = self.inner.lock().live.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    pub fn focused(&self) -> Option<SurfaceId> {
        self.inner.lock().focused
    }

    /// Options used by the most recent `create`, surviving destruction.
    pub fn last_options(&self) -> Option<SurfaceOptions> {
        self.inner.lock().last_options.clone()
    }
}

#[async_trait]
impl SurfaceProvider for MemorySurface {
    async fn create(&self, options: &SurfaceOptions) -> Result<SurfaceId> {
        let mut state = self.inner.lock();
        if state.fail_create {
            return Err(WardenError::SurfaceCreation(
                "display refused surface".to_string(),
            ));
        }
        state.next_id += 1;
        let id = SurfaceId(state.next_id);
        state.live.insert(id, options.clone());
        state.last_options = Some(options.clone());
        if !state.hold_focus_away {
            state.focused = Some(id);
        }
        state.ops.push(SurfaceOp::Create(id));
        Ok(id)
    }

    async fn destroy(&self, id: SurfaceId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Destroy(id));
        state.remove(id);
        Ok(())
    }

    async fn show(&self, id: SurfaceId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Show(id));
        Ok(())
    }

    async fn hide(&self, id: SurfaceId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Hide(id));
        state.broadcast(SurfaceEvent::Hidden { id });
        Ok(())
    }

    async fn focus(&self, id: SurfaceId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Focus(id));
        if !state.hold_focus_away {
            state.focused = Some(id);
        }
        Ok(())
    }

    async fn raise(&self, id: SurfaceId) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Raise(id));
        Ok(())
    }

    async fn pin(&self, id: SurfaceId, on: bool) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Pin(id, on));
        Ok(())
    }

    async fn set_attention(&self, id: SurfaceId, on: bool) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        state.ops.push(SurfaceOp::Attention(id, on));
        Ok(())
    }

    async fn is_focused(&self, id: SurfaceId) -> Result<bool> {
        let state = self.inner.lock();
        if !state.live.contains_key(&id) {
            return Err(WardenError::SurfaceGone(id.0));
        }
        Ok(state.focused == Some(id))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SurfaceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }
}
