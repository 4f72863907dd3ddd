// src/reload/mod.rs - Atomic dictionary hot-reload

use arc_swap::ArcSwap;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Duration;

pub mod watch;

pub use crate::config::WatchMode;
pub use watch::FileSignature;

use crate::config::DictionarySettings;
use crate::dictionary::{self, Dictionary, DictionaryOptions};
use crate::error::{GuardError, Result};
use crate::types::{LoadWarning, MatchReport, ReloadOutcome};
use watch::WatchHandle;

/// Events broadcast after every reload attempt
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    Reloaded(ReloadOutcome),
    Failed { error: String },
}

/// Synchronous callback invoked after each successful reload
pub type ReloadHook = Arc<dyn Fn(&ReloadOutcome) + Send + Sync>;

/// Shared state behind every clone of a controller
pub(crate) struct ControllerState {
    path: PathBuf,
    options: DictionaryOptions,

    /// Currently active snapshot
    active: ArcSwap<Dictionary>,

    /// Signature of the file as of the last reload attempt
    last_signature: RwLock<Option<FileSignature>>,

    /// Serialises reloads so two triggers never race
    reload_lock: Mutex<()>,

    change_notifier: broadcast::Sender<ReloadEvent>,
    reload_hook: RwLock<Option<ReloadHook>>,

    watch_handle: Mutex<Option<WatchHandle>>,
    disposed: AtomicBool,
}

/// Owns the active dictionary snapshot and replaces it atomically.
///
/// Readers take one `Arc<Dictionary>` per operation via [`snapshot`] and never
/// observe a partially built dictionary. Reloads build a complete new
/// dictionary off to the side and publish it with a single pointer swap.
///
/// Watch tasks only hold a weak reference, so dropping the last clone stops
/// watching even without [`shutdown`].
///
/// [`snapshot`]: ReloadController::snapshot
/// [`shutdown`]: ReloadController::shutdown
#[derive(Clone)]
pub struct ReloadController {
    state: Arc<ControllerState>,
}

impl ReloadController {
    /// Create a controller serving an empty dictionary until the first load
    pub fn new(path: impl Into<PathBuf>, options: DictionaryOptions) -> Self {
        let (change_notifier, _) = broadcast::channel(32);

        Self {
            state: Arc::new(ControllerState {
                path: path.into(),
                options,
                active: ArcSwap::from_pointee(Dictionary::empty(options.ignore_case)),
                last_signature: RwLock::new(None),
                reload_lock: Mutex::new(()),
                change_notifier,
                reload_hook: RwLock::new(None),
                watch_handle: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_settings(settings: &DictionarySettings) -> Self {
        Self::new(settings.path.clone(), settings.options())
    }

    pub(crate) fn downgrade(&self) -> Weak<ControllerState> {
        Arc::downgrade(&self.state)
    }

    /// Get a controller back from a watch task's weak reference
    pub(crate) fn upgrade(state: &Weak<ControllerState>) -> Option<Self> {
        state.upgrade().map(|state| Self { state })
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    pub fn options(&self) -> DictionaryOptions {
        self.state.options
    }

    /// Best-effort startup load.
    ///
    /// A missing, unreadable or undecodable file leaves the empty dictionary
    /// in place and is reported as a warning instead of an error.
    pub async fn initialize(&self) -> ReloadOutcome {
        match self.reload().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Starting with an empty dictionary: {}", e);
                let current = self.snapshot();
                ReloadOutcome {
                    term_count: current.term_count(),
                    batch_count: current.batch_count(),
                    regex_count: current.regex_count(),
                    warnings: vec![startup_warning(self.path(), &e)],
                    loaded_at: current.loaded_at(),
                    elapsed_ms: 0,
                }
            }
        }
    }

    /// Load the dictionary file and publish it.
    ///
    /// On failure the active snapshot stays untouched and the error is
    /// returned, logged and broadcast.
    pub async fn reload(&self) -> Result<ReloadOutcome> {
        if self.is_disposed() {
            return Err(GuardError::Disposed);
        }

        let state = &self.state;
        let _guard = state.reload_lock.lock().await;
        let started = Instant::now();

        let signature = FileSignature::read(&state.path).await;
        let path = state.path.clone();
        let options = state.options;
        let result = tokio::task::spawn_blocking(move || dictionary::load_file(&path, options))
            .await
            .map_err(GuardError::from)
            .and_then(|loaded| loaded);

        *state.last_signature.write().await = signature;

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to reload dictionary {}: {}", state.path.display(), e);
                let _ = state.change_notifier.send(ReloadEvent::Failed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if self.is_disposed() {
            info!("Discarding dictionary reload finished after shutdown");
            return Err(GuardError::Disposed);
        }

        let outcome = loaded.outcome(started.elapsed().as_millis() as u64);
        state.active.store(Arc::new(loaded.dictionary));

        info!(
            "Dictionary reloaded from {}: {} terms in {} batches, {} regex terms, \
             {} warnings ({} ms)",
            state.path.display(),
            outcome.term_count,
            outcome.batch_count,
            outcome.regex_count,
            outcome.warnings.len(),
            outcome.elapsed_ms
        );

        if let Some(hook) = state.reload_hook.read().await.as_ref() {
            hook(&outcome);
        }
        let _ = state
            .change_notifier
            .send(ReloadEvent::Reloaded(outcome.clone()));

        Ok(outcome)
    }

    /// Reload only if the file's modification signal moved since the last attempt
    pub async fn reload_if_changed(&self) -> Result<Option<ReloadOutcome>> {
        let current = match FileSignature::read(&self.state.path).await {
            Some(signature) => signature,
            None => return Ok(None),
        };

        if *self.state.last_signature.read().await == Some(current) {
            return Ok(None);
        }

        self.reload().await.map(Some)
    }

    /// The active snapshot. Hold on to it for the whole of one operation.
    pub fn snapshot(&self) -> Arc<Dictionary> {
        self.state.active.load_full()
    }

    /// Hit-test against the current snapshot
    pub fn hit(&self, text: &str) -> bool {
        self.state.active.load().hit(text)
    }

    /// Match collection against the current snapshot
    pub fn matches(&self, text: &str, cap: usize) -> MatchReport {
        self.state.active.load().matches(text, cap)
    }

    /// Subscribe to reload events
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.state.change_notifier.subscribe()
    }

    /// Register the callback run after every successful reload
    pub async fn set_reload_hook<F>(&self, hook: F)
    where
        F: Fn(&ReloadOutcome) + Send + Sync + 'static,
    {
        *self.state.reload_hook.write().await = Some(Arc::new(hook));
    }

    /// Start change detection, replacing any running watcher.
    ///
    /// Returns the mode actually in use: event watching falls back to polling
    /// when the platform watcher cannot be set up.
    pub async fn start_watching(
        &self,
        mode: WatchMode,
        poll_interval: Duration,
        debounce: Duration,
    ) -> Result<WatchMode> {
        if self.is_disposed() {
            return Err(GuardError::Disposed);
        }

        let (handle, active_mode) = match mode {
            WatchMode::Event => match watch::spawn_event_watcher(self, debounce) {
                Ok(handle) => (handle, WatchMode::Event),
                Err(e) => {
                    warn!("File events unavailable ({}), falling back to polling", e);
                    (watch::spawn_poller(self, poll_interval), WatchMode::Poll)
                }
            },
            WatchMode::Poll => (watch::spawn_poller(self, poll_interval), WatchMode::Poll),
        };

        *self.state.watch_handle.lock().await = Some(handle);
        Ok(active_mode)
    }

    /// Start watching according to configuration, if enabled
    pub async fn watch_with_settings(
        &self,
        settings: &DictionarySettings,
    ) -> Result<Option<WatchMode>> {
        if !settings.watch_for_changes {
            info!("Dictionary change watching disabled");
            return Ok(None);
        }

        self.start_watching(settings.watch_mode, settings.poll_interval(), settings.debounce())
            .await
            .map(Some)
    }

    /// Stop watching for changes, keeping the controller usable
    pub async fn stop_watching(&self) {
        if self.state.watch_handle.lock().await.take().is_some() {
            info!("Stopped watching {}", self.state.path.display());
        }
    }

    /// Release the watcher and refuse further reloads. The last snapshot
    /// keeps serving match calls.
    pub async fn shutdown(&self) {
        self.state.disposed.store(true, Ordering::SeqCst);
        self.stop_watching().await;
        info!("Reload controller for {} shut down", self.state.path.display());
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    pub async fn is_watching(&self) -> bool {
        self.state.watch_handle.lock().await.is_some()
    }
}

/// Warning reported when the startup load fails
fn startup_warning(path: &Path, error: &GuardError) -> LoadWarning {
    let path = path.to_path_buf();
    let reason = error.to_string();
    match error {
        GuardError::SourceUnavailable { .. } => LoadWarning::SourceUnavailable { path, reason },
        GuardError::Decode { .. } => LoadWarning::Undecodable { path, reason },
        _ => LoadWarning::LoadFailed { path, reason },
    }
}
