//! Focus guard cadence.
//!
//! While a lockdown is enforcing, a monitor task ticks at the profile's
//! interval and queues a [`EngineEvent::FocusTick`] per tick. The engine
//! probes and corrects focus when it handles the tick; the monitor
//! itself never touches the surface, so corrections serialize with every
//! other piece of engine work.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::events::EngineEvent;

/// Handle to the running cadence task. At most one exists per engine;
/// replacing it stops the previous task.
#[derive(Debug)]
pub struct FocusMonitor {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FocusMonitor {
    /// Start ticking. Every tick carries `epoch` so a tick queued before
    /// a state change dies harmlessly at the epoch check.
    pub fn spawn(interval: Duration, epoch: u64, tx: UnboundedSender<EngineEvent>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            Self::tick_loop(interval, epoch, tx, shutdown_rx).await;
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn tick_loop(
        interval: Duration,
        epoch: u64,
        tx: UnboundedSender<EngineEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tx.send(EngineEvent::FocusTick { epoch }).is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Focus monitor stopped");
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for FocusMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}
