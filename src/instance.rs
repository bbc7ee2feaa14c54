//! Single-instance enforcement.
//!
//! A second copy of the app fighting the first over shortcuts and
//! surfaces would defeat the lockdown, so exactly one engine may run per
//! machine. Ownership is a lock file holding the owner's pid; a lock
//! whose owner is gone is stale and gets replaced.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, WardenError};

fn get_hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Contents of the instance lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub hostname: String,
}

impl Default for InstanceInfo {
    fn default() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
            hostname: get_hostname(),
        }
    }
}

impl InstanceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the recorded owner is still a live process on this host.
    /// A lock from another hostname cannot be probed, so it counts as
    /// not alive and gets replaced.
    pub fn is_process_alive(&self) -> bool {
        if self.hostname != get_hostname() {
            return false;
        }
        is_process_running(self.pid)
    }
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
        .map(|o| {
            let out = String::from_utf8_lossy(&o.stdout);
            o.status.success() && !out.contains("INFO:") && out.contains(&pid.to_string())
        })
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
fn is_process_running(_pid: u32) -> bool {
    false
}

/// Acquirer for the per-machine instance lock.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("instance.lock"),
        }
    }

    /// Take ownership of the instance lock.
    ///
    /// Fails with `AlreadyRunning` when a live owner exists. A lock left
    /// behind by a dead process is removed and taken over.
    pub async fn acquire(&self) -> Result<InstanceGuard> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Some(existing) = self.read().await? {
            if existing.is_process_alive() {
                return Err(WardenError::AlreadyRunning { pid: existing.pid });
            }
            info!(old_pid = existing.pid, "Removing stale instance lock");
        }

        let info = InstanceInfo::new();
        let content = serde_json::to_string_pretty(&info)?;
        let temp_path = self
            .path
            .with_extension(format!("{}.lock.tmp", info.pid));
        fs::write(&temp_path, &content).await?;

        match fs::rename(&temp_path, &self.path).await {
            Ok(_) => {
                debug!(pid = info.pid, "Instance lock acquired");
                Ok(InstanceGuard {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e.into())
            }
        }
    }

    pub async fn read(&self) -> Result<Option<InstanceInfo>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Held for the life of the process; releases the lock file on drop.
pub struct InstanceGuard {
    path: PathBuf,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            if !std::thread::panicking() {
                warn!(error = %e, "Failed to release instance lock");
            } else {
                eprintln!("[taskwarden] Failed to release instance lock: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_writes_own_pid() {
        let dir = TempDir::new().unwrap();
        let lock = InstanceLock::new(dir.path());

        let _guard = lock.acquire().await.unwrap();
        let info = lock.read().await.unwrap().unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[tokio::test]
    async fn test_second_acquire_reports_owner() {
        let dir = TempDir::new().unwrap();
        let lock = InstanceLock::new(dir.path());

        let _guard = lock.acquire().await.unwrap();
        match lock.acquire().await {
            Err(WardenError::AlreadyRunning { pid }) => {
                assert_eq!(pid, std::process::id());
            }
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_stale_foreign_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let lock = InstanceLock::new(dir.path());

        let stale = InstanceInfo {
            pid: 12345,
            started_at: Utc::now(),
            hostname: "some-other-host".to_string(),
        };
        tokio::fs::write(
            dir.path().join("instance.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .await
        .unwrap();

        let _guard = lock.acquire().await.unwrap();
        let info = lock.read().await.unwrap().unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let lock = InstanceLock::new(dir.path());

        let guard = lock.acquire().await.unwrap();
        drop(guard);

        assert!(lock.read().await.unwrap().is_none());
    }
}
