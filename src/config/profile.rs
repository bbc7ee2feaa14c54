use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, WardenError};

/// Which of the two built-in behavior bundles the engine runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Dev,
    #[default]
    Prod,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable lockdown behavior bundle, selected once at startup.
///
/// The engine is constructed with one concrete `Profile` for its lifetime;
/// nothing re-reads an environment flag at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub kind: ProfileKind,
    /// Whether the surface is created closable.
    pub allow_close: bool,
    /// Skip login-item registration entirely.
    pub disable_auto_launch: bool,
    /// Leave devtools shortcuts out of the capture filter.
    pub allow_dev_tools: bool,
    /// Ask the provider to open devtools on surface creation.
    pub open_dev_tools: bool,
    /// How long a temporary unlock lasts before relocking.
    pub unlock_duration_ms: u64,
    /// Quit the process on unlock instead of unlocking temporarily.
    pub quit_on_complete: bool,
    /// Focus guard tick interval while locked.
    pub focus_monitor_interval_ms: u64,
    /// Delay before a destroyed surface is recreated.
    pub respawn_delay_ms: u64,
}

impl Profile {
    pub fn dev() -> Self {
        Self {
            kind: ProfileKind::Dev,
            allow_close: true,
            disable_auto_launch: true,
            allow_dev_tools: true,
            open_dev_tools: true,
            unlock_duration_ms: 5_000,
            quit_on_complete: false,
            focus_monitor_interval_ms: 1_000,
            respawn_delay_ms: 1_000,
        }
    }

    pub fn prod() -> Self {
        Self {
            kind: ProfileKind::Prod,
            allow_close: false,
            disable_auto_launch: false,
            allow_dev_tools: false,
            open_dev_tools: false,
            unlock_duration_ms: 30_000,
            quit_on_complete: true,
            focus_monitor_interval_ms: 250,
            respawn_delay_ms: 100,
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Dev => Self::dev(),
            ProfileKind::Prod => Self::prod(),
        }
    }

    /// Load a profile, applying overrides from `path` if the file exists.
    ///
    /// Overrides are read once here; the resulting `Profile` is immutable
    /// for the rest of the process.
    pub async fn load(kind: ProfileKind, path: Option<&Path>) -> Result<Self> {
        let mut profile = Self::for_kind(kind);
        if let Some(path) = path
            && path.exists()
        {
            let content = fs::read_to_string(path).await?;
            let overrides: ProfileOverrides = toml::from_str(&content)?;
            profile.apply(overrides);
        }
        profile.validate()?;
        Ok(profile)
    }

    pub fn unlock_duration(&self) -> Duration {
        Duration::from_millis(self.unlock_duration_ms)
    }

    pub fn focus_monitor_interval(&self) -> Duration {
        Duration::from_millis(self.focus_monitor_interval_ms)
    }

    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }

    fn apply(&mut self, overrides: ProfileOverrides) {
        if let Some(v) = overrides.allow_close {
            self.allow_close = v;
        }
        if let Some(v) = overrides.disable_auto_launch {
            self.disable_auto_launch = v;
        }
        if let Some(v) = overrides.allow_dev_tools {
            self.allow_dev_tools = v;
        }
        if let Some(v) = overrides.open_dev_tools {
            self.open_dev_tools = v;
        }
        if let Some(v) = overrides.unlock_duration_ms {
            self.unlock_duration_ms = v;
        }
        if let Some(v) = overrides.quit_on_complete {
            self.quit_on_complete = v;
        }
        if let Some(v) = overrides.focus_monitor_interval_ms {
            self.focus_monitor_interval_ms = v;
        }
        if let Some(v) = overrides.respawn_delay_ms {
            self.respawn_delay_ms = v;
        }
    }

    /// Validate values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.unlock_duration_ms == 0 {
            errors.push("unlock_duration_ms must be greater than 0");
        }
        if self.focus_monitor_interval_ms == 0 {
            errors.push("focus_monitor_interval_ms must be greater than 0");
        }
        if self.respawn_delay_ms == 0 {
            errors.push("respawn_delay_ms must be greater than 0");
        }
        if self.focus_monitor_interval_ms > self.unlock_duration_ms {
            errors.push("focus_monitor_interval_ms must not exceed unlock_duration_ms");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Config(format!(
                "Profile validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Partial profile read from an optional TOML override file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverrides {
    pub allow_close: Option<bool>,
    pub disable_auto_launch: Option<bool>,
    pub allow_dev_tools: Option<bool>,
    pub open_dev_tools: Option<bool>,
    pub unlock_duration_ms: Option<u64>,
    pub quit_on_complete: Option<bool>,
    pub focus_monitor_interval_ms: Option<u64>,
    pub respawn_delay_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_profile_values() {
        let p = Profile::dev();
        assert!(p.allow_close);
        assert!(p.disable_auto_launch);
        assert!(p.allow_dev_tools);
        assert!(!p.quit_on_complete);
        assert_eq!(p.unlock_duration_ms, 5_000);
        assert_eq!(p.focus_monitor_interval_ms, 1_000);
    }

    #[test]
    fn test_prod_profile_values() {
        let p = Profile::prod();
        assert!(!p.allow_close);
        assert!(!p.allow_dev_tools);
        assert!(p.quit_on_complete);
        assert_eq!(p.unlock_duration_ms, 30_000);
        assert_eq!(p.focus_monitor_interval_ms, 250);
        assert_eq!(p.respawn_delay_ms, 100);
    }

    #[test]
    fn test_builtin_profiles_validate() {
        assert!(Profile::dev().validate().is_ok());
        assert!(Profile::prod().validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut p = Profile::dev();
        p.unlock_duration_ms = 0;
        let err = p.validate().unwrap_err().to_string();
        assert!(err.contains("unlock_duration_ms"));
    }

    #[test]
    fn test_interval_may_not_exceed_unlock_duration() {
        let mut p = Profile::dev();
        p.focus_monitor_interval_ms = p.unlock_duration_ms + 1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_only_present_fields() {
        let mut p = Profile::prod();
        p.apply(ProfileOverrides {
            unlock_duration_ms: Some(60_000),
            ..Default::default()
        });
        assert_eq!(p.unlock_duration_ms, 60_000);
        assert!(p.quit_on_complete);
        assert_eq!(p.focus_monitor_interval_ms, 250);
    }
}
