use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ProfileKind;

#[derive(Parser)]
#[command(name = "taskwarden")]
#[command(
    author,
    version,
    about = "Lockdown enforcement engine for the taskwarden focus app",
    long_about = None
)]
pub struct Cli {
    /// Behavior profile to run under
    #[arg(long, value_enum, default_value = "prod", env = "TASKWARDEN_PROFILE")]
    pub profile: ProfileArg,

    /// Directory holding the task store and instance lock
    #[arg(long, default_value = ".taskwarden", env = "TASKWARDEN_DATA_DIR")]
    pub data_dir: PathBuf,

    /// TOML file with profile overrides
    #[arg(long, env = "TASKWARDEN_OVERRIDES")]
    pub overrides: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI-facing profile selector.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum ProfileArg {
    Dev,
    #[default]
    Prod,
}

impl From<ProfileArg> for ProfileKind {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Dev => ProfileKind::Dev,
            ProfileArg::Prod => ProfileKind::Prod,
        }
    }
}
