//! Command-line interface and the front-end protocol bridge.
//!
//! - `Cli`: argument definitions via clap
//! - `ProtocolBridge`: line-delimited JSON surface protocol over stdio

mod bridge;
mod commands;

pub use bridge::ProtocolBridge;
pub use commands::{Cli, ProfileArg};
