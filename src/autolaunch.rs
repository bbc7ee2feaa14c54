//! Login-item registration seam.
//!
//! The engine registers itself to start at login while a lockdown regime
//! is in force and drops the registration when a quit-on-complete unlock
//! retires it for the day. All calls are best effort; a machine that
//! cannot manage login items still gets a working lockdown.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
#[cfg(any(target_os = "linux", target_os = "macos"))]
use tokio::fs;
#[cfg(target_os = "windows")]
use tokio::process::Command;
use tracing::warn;

use crate::error::{Result, WardenError};

#[cfg(target_os = "windows")]
const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

/// System facility for start-at-login registration.
#[async_trait]
pub trait AutoLaunchService: Send + Sync {
    async fn is_enabled(&self) -> Result<bool>;

    async fn enable(&self) -> Result<()>;

    async fn disable(&self) -> Result<()>;
}

/// Register for auto-launch unless already registered. Failures are
/// logged and swallowed.
pub async fn ensure_enabled(service: &dyn AutoLaunchService) {
    match service.is_enabled().await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = service.enable().await {
                warn!(error = %e, "Auto-launch setup failed");
            }
        }
        Err(e) => warn!(error = %e, "Auto-launch status check failed"),
    }
}

/// Login-item registration through the host's own facility: an XDG
/// autostart entry on Linux, a LaunchAgents plist on macOS, a Run
/// registry value on Windows.
pub struct LoginItemAutoLaunch {
    app_name: String,
    exec_path: PathBuf,
}

impl LoginItemAutoLaunch {
    pub fn new(app_name: impl Into<String>, exec_path: impl Into<PathBuf>) -> Self {
        Self {
            app_name: app_name.into(),
            exec_path: exec_path.into(),
        }
    }

    /// Register the running executable itself.
    pub fn for_current_exe(app_name: impl Into<String>) -> Result<Self> {
        let exec_path = std::env::current_exe()?;
        Ok(Self::new(app_name, exec_path))
    }

    #[cfg(target_os = "linux")]
    fn entry_path(&self) -> Result<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => match std::env::var("HOME") {
                Ok(home) => PathBuf::from(home).join(".config"),
                Err(_) => {
                    return Err(WardenError::AutoLaunch(
                        "neither XDG_CONFIG_HOME nor HOME is set".to_string(),
                    ));
                }
            },
        };
        Ok(config_dir
            .join("autostart")
            .join(format!("{}.desktop", self.app_name)))
    }

    #[cfg(target_os = "macos")]
    fn entry_path(&self) -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| WardenError::AutoLaunch("HOME is not set".to_string()))?;
        Ok(PathBuf::from(home)
            .join("Library/LaunchAgents")
            .join(format!("{}.plist", self.app_name)))
    }

    #[cfg(target_os = "linux")]
    fn entry_contents(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name={}\n\
             Exec={}\n\
             X-GNOME-Autostart-enabled=true\n",
            self.app_name,
            self.exec_path.display()
        )
    }

    #[cfg(target_os = "macos")]
    fn entry_contents(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
            self.app_name,
            self.exec_path.display()
        )
    }
}

#[async_trait]
impl AutoLaunchService for LoginItemAutoLaunch {
    async fn is_enabled(&self) -> Result<bool> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            Ok(fs::try_exists(self.entry_path()?).await?)
        }
        #[cfg(target_os = "windows")]
        {
            let output = Command::new("reg")
                .args(["query", RUN_KEY, "/v", &self.app_name])
                .output()
                .await?;
            Ok(output.status.success())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(false)
        }
    }

    async fn enable(&self) -> Result<()> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            let path = self.entry_path()?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, self.entry_contents()).await?;
            Ok(())
        }
        #[cfg(target_os = "windows")]
        {
            let output = Command::new("reg")
                .args([
                    "add",
                    RUN_KEY,
                    "/v",
                    &self.app_name,
                    "/t",
                    "REG_SZ",
                    "/d",
                    &self.exec_path.display().to_string(),
                    "/f",
                ])
                .output()
                .await?;
            if !output.status.success() {
                return Err(WardenError::AutoLaunch(format!(
                    "reg add exited with {}",
                    output.status
                )));
            }
            Ok(())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Err(WardenError::AutoLaunch(
                "no login-item facility on this platform".to_string(),
            ))
        }
    }

    async fn disable(&self) -> Result<()> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            match fs::remove_file(self.entry_path()?).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        #[cfg(target_os = "windows")]
        {
            let output = Command::new("reg")
                .args(["delete", RUN_KEY, "/v", &self.app_name, "/f"])
                .output()
                .await?;
            if !output.status.success() {
                // reg delete reports failure for an absent value too.
                tracing::debug!(status = %output.status, "reg delete reported failure");
            }
            Ok(())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(())
        }
    }
}

/// Service for hosts without login-item support. Reports disabled and
/// accepts every change as a no-op.
#[derive(Default)]
pub struct NullAutoLaunch;

#[async_trait]
impl AutoLaunchService for NullAutoLaunch {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(false)
    }

    async fn enable(&self) -> Result<()> {
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryAutoLaunchState {
    enabled: bool,
    enable_calls: usize,
    disable_calls: usize,
    fail_enable: bool,
    fail_disable: bool,
}

/// In-memory service double counting every call.
#[derive(Default)]
pub struct MemoryAutoLaunch {
    inner: Mutex<MemoryAutoLaunchState>,
}

impl MemoryAutoLaunch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    pub fn enable_calls(&self) -> usize {
        self.inner.lock().enable_calls
    }

    pub fn disable_calls(&self) -> usize {
        self.inner.lock().disable_calls
    }

    pub fn fail_enable(&self, on: bool) {
        self.inner.lock().fail_enable = on;
    }

    pub fn fail_disable(&self, on: bool) {
        self.inner.lock().fail_disable = on;
    }
}

#[async_trait]
impl AutoLaunchService for MemoryAutoLaunch {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.inner.lock().enabled)
    }

    async fn enable(&self) -> Result<()> {
        let mut state = self.inner.lock();
        state.enable_calls += 1;
        if state.fail_enable {
            return Err(WardenError::AutoLaunch("injected enable failure".to_string()));
        }
        state.enabled = true;
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        let mut state = self.inner.lock();
        state.disable_calls += 1;
        if state.fail_disable {
            return Err(WardenError::AutoLaunch(
                "injected disable failure".to_string(),
            ));
        }
        state.enabled = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_enabled_registers_once() {
        let service = MemoryAutoLaunch::new();

        ensure_enabled(&service).await;
        assert!(service.enabled());
        assert_eq!(service.enable_calls(), 1);

        ensure_enabled(&service).await;
        assert_eq!(service.enable_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_enabled_swallows_failure() {
        let service = MemoryAutoLaunch::new();
        service.fail_enable(true);

        ensure_enabled(&service).await;
        assert!(!service.enabled());
        assert_eq!(service.enable_calls(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_desktop_entry_points_at_the_executable() {
        let service = LoginItemAutoLaunch::new("taskwarden", "/opt/taskwarden/bin/taskwarden");
        let contents = service.entry_contents();

        assert!(contents.starts_with("[Desktop Entry]"));
        assert!(contents.contains("Exec=/opt/taskwarden/bin/taskwarden"));
        assert!(contents.contains("Name=taskwarden"));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_launch_agent_runs_at_load() {
        let service = LoginItemAutoLaunch::new("taskwarden", "/opt/taskwarden/bin/taskwarden");
        let contents = service.entry_contents();

        assert!(contents.contains("<key>RunAtLoad</key>"));
        assert!(contents.contains("<string>/opt/taskwarden/bin/taskwarden</string>"));
    }
}
