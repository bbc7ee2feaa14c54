//! Engine queue events and the surface message protocol.
//!
//! Everything the engine reacts to arrives on one queue as an
//! [`EngineEvent`] and is processed to completion before the next is
//! dequeued. Timer-born events carry the epoch they were scheduled
//! under; the engine drops them when the epoch has moved on.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::surface::SurfaceEvent;
use crate::tasks::Task;

/// Request from the content surface. Fire-and-forget except for
/// `GetTasks`, which carries its reply channel.
#[derive(Debug)]
pub enum SurfaceMessage {
    /// All tasks are done; resolve against the profile.
    Unlock,
    /// Return to enforcement ahead of the relock deadline.
    ResetSession,
    GetTasks { reply: oneshot::Sender<Vec<Task>> },
    SaveTasks { tasks: Vec<Task> },
}

/// One unit of engine work.
#[derive(Debug)]
pub enum EngineEvent {
    Message(SurfaceMessage),
    Surface(SurfaceEvent),
    /// The unlock window elapsed.
    RelockDue { epoch: u64 },
    /// The teardown grace period elapsed.
    CleanupDue,
    /// The respawn delay after an unexpected surface loss elapsed.
    RespawnDue { epoch: u64 },
    /// Focus guard cadence tick.
    FocusTick { epoch: u64 },
    /// The attention cue has flashed long enough.
    AttentionClear { epoch: u64 },
    /// Another launch of the app knocked while we hold the instance lock.
    SecondInstance,
}

/// Surface request as it travels a transport, for front ends that speak
/// to the engine over a byte stream rather than in-process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireMessage {
    Unlock,
    ResetSession,
    GetTasks,
    SaveTasks { tasks: Vec<Task> },
}

/// Engine reply on the same transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireReply {
    TasksData { tasks: Vec<Task> },
}
