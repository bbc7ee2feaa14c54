//! Lockdown behavior configuration.
//!
//! A [`Profile`] bundles every toggle the engine consults (unlock duration,
//! focus guard cadence, respawn delay, closability). Two built-in profiles
//! exist, `dev` and `prod`, optionally adjusted by a TOML override file.

mod profile;

pub use profile::{Profile, ProfileKind, ProfileOverrides};
