use thiserror::Error;

use crate::lockdown::LockState;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    #[error("No such surface: {0}")]
    SurfaceGone(u64),

    #[error("Shortcut registration failed for {id}: {message}")]
    ShortcutRegistration { id: &'static str, message: String },

    #[error("Invalid lock transition: {from} -> {to}")]
    InvalidTransition { from: LockState, to: LockState },

    #[error("Auto-launch error: {0}")]
    AutoLaunch(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Another instance is already running (PID: {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Engine is no longer running")]
    EngineClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
