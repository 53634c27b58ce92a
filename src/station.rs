//! Station lifecycle, diagnostics and log maintenance

use crate::command;
use crate::error::NetplanResult;
use serde::Serialize;
use std::fmt;
use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StationAction {
    Reboot,
    Shutdown,
}

impl StationAction {
    pub fn command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            StationAction::Reboot => ("reboot", &[]),
            StationAction::Shutdown => ("shutdown", &["now"]),
        }
    }
}

impl fmt::Display for StationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationAction::Reboot => f.write_str("reboot"),
            StationAction::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Runs reboot/shutdown after a delay so the HTTP reply can leave first
pub struct StationController {
    delay: Duration,
}

impl StationController {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn schedule(&self, action: StationAction) -> JoinHandle<()> {
        let delay = self.delay;
        warn!("Station {} in {:?}", action, delay);

        tokio::spawn(async move {
            sleep(delay).await;
            let (program, args) = action.command();
            if let Err(e) = command::run(program, args).await {
                error!("Station {} failed: {}", action, e);
            }
        })
    }
}

/// Output of `ip a`
pub async fn ip_addr_dump() -> NetplanResult<String> {
    command::run("ip", &["a"]).await
}

/// The front end's log directory
pub struct LogDirectory {
    dir: PathBuf,
    mode: u32,
}

impl LogDirectory {
    pub fn new(dir: impl Into<PathBuf>, mode: u32) -> Self {
        Self { dir: dir.into(), mode }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Delete the `*.log` files directly inside the directory. A missing
    /// directory has nothing to clear.
    pub async fn clear(&self) -> NetplanResult<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} does not exist, no logs to clear", self.dir.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_log = path.extension().is_some_and(|ext| ext == "log");
            if is_log && entry.file_type().await?.is_file() {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        info!("Removed {} log file(s) from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Apply the configured mode to the directory and everything below it.
    /// Symlinks are not followed.
    pub async fn open_permissions(&self) -> NetplanResult<usize> {
        let mut pending = vec![self.dir.clone()];
        let mut changed = 0;

        while let Some(path) = pending.pop() {
            let file_type = fs::symlink_metadata(&path).await?.file_type();
            if file_type.is_symlink() {
                continue;
            }

            fs::set_permissions(&path, Permissions::from_mode(self.mode)).await?;
            changed += 1;

            if file_type.is_dir() {
                let mut entries = fs::read_dir(&path).await?;
                while let Some(entry) = entries.next_entry().await? {
                    pending.push(entry.path());
                }
            }
        }

        info!("Set mode {:o} on {} path(s) under {}", self.mode, changed, self.dir.display());
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_action_commands() {
        assert_eq!(StationAction::Reboot.command(), ("reboot", &[][..]));
        assert_eq!(StationAction::Shutdown.command(), ("shutdown", &["now"][..]));
        assert_eq!(StationAction::Shutdown.to_string(), "shutdown");
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&StationAction::Reboot).unwrap(), "\"reboot\"");
    }

    fn log_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in ["app.log", "api.log", "notes.txt"] {
            std::fs::write(dir.path().join(name), "line\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("archive")).unwrap();
        std::fs::write(dir.path().join("archive").join("old.log"), "line\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_clear_removes_top_level_logs_only() {
        let dir = log_tree();
        let logs = LogDirectory::new(dir.path(), 0o777);

        assert_eq!(logs.clear().await.unwrap(), 2);
        assert!(!dir.path().join("app.log").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("archive").join("old.log").exists());

        assert_eq!(logs.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let dir = TempDir::new().unwrap();
        let logs = LogDirectory::new(dir.path().join("logs"), 0o777);
        assert_eq!(logs.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_permissions_is_recursive() {
        let dir = log_tree();
        let logs = LogDirectory::new(dir.path(), 0o750);

        // root, three files, archive/ and archive/old.log
        assert_eq!(logs.open_permissions().await.unwrap(), 6);

        let mode = |p: PathBuf| std::fs::metadata(p).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode(dir.path().join("notes.txt")), 0o750);
        assert_eq!(mode(dir.path().join("archive")), 0o750);
        assert_eq!(mode(dir.path().join("archive").join("old.log")), 0o750);
    }

    #[tokio::test]
    async fn test_open_permissions_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let logs = LogDirectory::new(dir.path().join("logs"), 0o777);
        assert!(logs.open_permissions().await.is_err());
    }
}
