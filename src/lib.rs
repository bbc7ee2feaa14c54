pub mod autolaunch;
pub mod cli;
pub mod config;
pub mod error;
pub mod instance;
pub mod lockdown;
pub mod shortcuts;
pub mod store;
pub mod surface;
pub mod tasks;

pub use autolaunch::{AutoLaunchService, LoginItemAutoLaunch, MemoryAutoLaunch, NullAutoLaunch};
pub use config::{Profile, ProfileKind};
pub use error::{Result, WardenError};
pub use instance::{InstanceGuard, InstanceInfo, InstanceLock};
pub use lockdown::{
    EngineHandle, LockState, LockdownEngine, SurfaceMessage, WireMessage, WireReply,
};
pub use shortcuts::{MemoryRegistrar, Shortcut, ShortcutRegistrar};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use surface::{MemorySurface, SurfaceEvent, SurfaceId, SurfaceOptions, SurfaceProvider};
pub use tasks::{Task, TaskBook};
