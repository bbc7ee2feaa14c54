//! Lockdown enforcement core.
//!
//! The pieces that keep a lockdown in force: the lock state machine, the
//! single-queue engine that owns every decision, the focus guard
//! cadence, shortcut interception, and respawn scheduling for surfaces
//! destroyed behind the engine's back.

mod engine;
mod events;
mod focus_guard;
mod interceptor;
mod machine;
mod respawn;
mod timer;

pub use engine::{ATTENTION_FLASH_MS, CLEANUP_DELAY_MS, EngineHandle, LockdownEngine};
pub use events::{EngineEvent, SurfaceMessage, WireMessage, WireReply};
pub use focus_guard::FocusMonitor;
pub use interceptor::ShortcutInterceptor;
pub use machine::LockState;
pub use respawn::RespawnSupervisor;
pub use timer::Deadline;
