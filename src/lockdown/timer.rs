//! One-shot deadlines feeding the engine queue.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::events::EngineEvent;

/// A single future event delivery.
///
/// Dropping a `Deadline` aborts the delivery, so storing a replacement in
/// the same slot cancels the previous one. A deadline that already fired
/// may still have its event in the queue; the engine's epoch check
/// handles that side of the race.
#[derive(Debug)]
pub struct Deadline {
    handle: JoinHandle<()>,
}

impl Deadline {
    /// Deliver `event` onto the queue after `after`.
    pub fn spawn(after: Duration, tx: UnboundedSender<EngineEvent>, event: EngineEvent) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(event);
        });
        Self { handle }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _deadline = Deadline::spawn(
            Duration::from_millis(100),
            tx,
            EngineEvent::RelockDue { epoch: 7 },
        );

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(matches!(
            rx.try_recv(),
            Ok(EngineEvent::RelockDue { epoch: 7 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_cancels_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let deadline = Deadline::spawn(Duration::from_millis(100), tx, EngineEvent::CleanupDue);
        drop(deadline);

        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_cancels_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = Some(Deadline::spawn(
            Duration::from_millis(100),
            tx.clone(),
            EngineEvent::RelockDue { epoch: 1 },
        ));

        tokio::time::advance(Duration::from_millis(50)).await;
        let previous = slot.replace(Deadline::spawn(
            Duration::from_millis(100),
            tx,
            EngineEvent::RelockDue { epoch: 2 },
        ));
        drop(previous);

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(matches!(
            rx.try_recv(),
            Ok(EngineEvent::RelockDue { epoch: 2 })
        ));
        assert!(rx.try_recv().is_err());
        drop(slot);
    }
}
