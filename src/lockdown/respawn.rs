//! Respawn scheduling for unexpectedly destroyed surfaces.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::events::EngineEvent;
use super::timer::Deadline;

/// Holds at most one pending respawn.
///
/// A destroyed surface produces exactly one replacement: further close
/// events while a respawn is pending change nothing, and clearing the
/// supervisor cancels the pending one. Delivery goes through the engine
/// queue, so the respawn still lands after whatever the engine is
/// processing when the delay elapses.
#[derive(Debug)]
pub struct RespawnSupervisor {
    delay: Duration,
    pending: Option<Deadline>,
}

impl RespawnSupervisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule a respawn for the current epoch, unless one is pending.
    pub fn schedule(&mut self, epoch: u64, tx: &UnboundedSender<EngineEvent>) {
        if self.pending.is_some() {
            debug!("Respawn already scheduled");
            return;
        }
        self.pending = Some(Deadline::spawn(
            self.delay,
            tx.clone(),
            EngineEvent::RespawnDue { epoch },
        ));
    }

    /// Drop the pending respawn, if any.
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }
}
