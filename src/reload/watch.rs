// src/reload/watch.rs - Dictionary file change detection

use log::{debug, error, info};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use super::ReloadController;
use crate::error::{GuardError, Result};

/// Modification signal used to detect changes without filesystem events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl FileSignature {
    /// Read the current signature, `None` if the file is gone
    pub async fn read(path: &Path) -> Option<Self> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Running change-detection task. Dropping it stops watching.
pub(crate) struct WatchHandle {
    task: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch the dictionary's directory and reload on events that touch the file.
///
/// The parent directory is watched rather than the file itself so editors
/// that save by rename keep triggering reloads.
pub(crate) fn spawn_event_watcher(
    controller: &ReloadController,
    debounce: Duration,
) -> Result<WatchHandle> {
    let path = controller.path().to_path_buf();
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| GuardError::Config(format!("{} is not a file path", path.display())))?;
    let watch_dir = watch_directory(&path);

    let (tx, mut rx) = mpsc::channel::<()>(16);
    let target = file_name.clone();
    let mut watcher =
        notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            match res {
                Ok(event) if is_relevant(&event, &target) => {
                    // A full channel already has a reload pending
                    let _ = tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => error!("Dictionary watch error: {}", e),
            }
        })?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    let state = controller.downgrade();
    let task = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // Coalesce bursts of writes into one reload
            sleep(debounce).await;
            while rx.try_recv().is_ok() {}

            let Some(controller) = ReloadController::upgrade(&state) else {
                break;
            };
            if controller.is_disposed() {
                break;
            }

            info!("Dictionary file {} changed, reloading...", controller.path().display());
            // Failures are logged and broadcast by reload itself
            let _ = controller.reload().await;
        }
        debug!("Dictionary event watcher stopped");
    });

    info!("Watching {} for changes to {:?}", watch_dir.display(), file_name);

    Ok(WatchHandle {
        task,
        _watcher: Some(watcher),
    })
}

/// Poll the dictionary's modification signal on a fixed interval
pub(crate) fn spawn_poller(controller: &ReloadController, every: Duration) -> WatchHandle {
    info!(
        "Polling {} for changes every {:?}",
        controller.path().display(),
        every
    );

    let state = controller.downgrade();
    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(controller) = ReloadController::upgrade(&state) else {
                break;
            };
            if controller.is_disposed() {
                break;
            }
            if let Err(e) = controller.reload_if_changed().await {
                debug!("Polled reload failed: {}", e);
            }
        }
        debug!("Dictionary poller stopped");
    });

    WatchHandle {
        task,
        _watcher: None,
    }
}

fn watch_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name().map_or(false, |name| name == file_name.as_os_str()))
}
