//! Hot reload of resolved configuration.
//!
//! Watches every existing search directory (non-recursively) for edits to
//! candidate config files and `package.json`. After each debounced batch the
//! changed files are evicted from the cache, the request is resolved again and
//! the new config is published through an [`ArcSwap`]. A failed reload keeps
//! the previous config.

use crate::error::Result;
use crate::loader::{alias_stems, primary_stems};
use crate::resolve::{ConfigRequest, Resolver};
use arc_swap::ArcSwap;
use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc as async_mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often the blocking watch loop checks whether its [`LiveConfig`] is gone.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Events published by a [`LiveConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// The config was re-resolved after these files changed.
    Reloaded(Vec<PathBuf>),
    /// Re-resolution failed; the previous config is still current.
    ReloadFailed { paths: Vec<PathBuf>, error: String },
    /// The file watcher itself reported an error.
    Error(String),
}

impl ConfigChangeEvent {
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::Reloaded(paths) | ConfigChangeEvent::ReloadFailed { paths, .. } => {
                paths.iter().map(PathBuf::as_path).collect()
            }
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Debounce duration for coalescing rapid changes.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// File names that can affect a resolution.
#[derive(Debug, Clone)]
struct WatchFilter {
    file_names: HashSet<String>,
}

impl WatchFilter {
    fn new<T>(request: &ConfigRequest<T>, extensions: &[&str]) -> Self {
        let mut stems = primary_stems(&request.name, true);
        if let Some(alias) = request.alias.as_deref().filter(|a| !a.is_empty()) {
            stems.extend(alias_stems(&request.name, alias));
        }
        let mut file_names: HashSet<String> = stems
            .iter()
            .flat_map(|stem| extensions.iter().map(move |ext| format!("{stem}.{ext}")))
            .collect();
        file_names.insert("package.json".to_string());
        Self { file_names }
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.file_names.contains(n))
    }
}

/// A continuously re-resolved config.
///
/// Dropping it stops reloading.
pub struct LiveConfig<T> {
    current: Arc<ArcSwap<T>>,
    /// Change notifications. Starts at `None`.
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    watched: Vec<PathBuf>,
    reload_task: JoinHandle<()>,
    _watch_task: JoinHandle<()>,
}

impl<T> LiveConfig<T> {
    /// The current config.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Directories being watched.
    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Wait for the next change event.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    pub fn latest_event(&self) -> Option<ConfigChangeEvent> {
        self.events.borrow().clone()
    }
}

impl<T> Drop for LiveConfig<T> {
    fn drop(&mut self) {
        // The blocking watch task notices the closed channel within SHUTDOWN_POLL.
        self.reload_task.abort();
    }
}

/// Resolve `request` and keep it up to date as its files change.
///
/// The initial resolution must succeed.
pub async fn watch_config<T>(
    resolver: Resolver,
    request: ConfigRequest<T>,
    options: WatchOptions,
) -> Result<LiveConfig<T>>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let initial = resolver.load(&request).await?;
    let current = Arc::new(ArcSwap::from_pointee(initial));

    let extensions: Vec<&str> = resolver.context().loaders().extensions().collect();
    let filter = WatchFilter::new(&request, &extensions);
    let watched = request
        .search_paths(resolver.context().home_dir())
        .existing_dirs();

    let (notify_tx, notify_rx) = mpsc::channel();
    let mut debouncer = new_debouncer(options.debounce, notify_tx)?;
    for dir in &watched {
        info!(dir = %dir.display(), "Watching config directory");
        debouncer
            .watcher()
            .watch(dir, notify::RecursiveMode::NonRecursive)?;
    }

    let (signal_tx, mut signal_rx) = async_mpsc::unbounded_channel();
    let ctx = resolver.context().clone();
    let watch_task = tokio::task::spawn_blocking(move || {
        let _debouncer = debouncer;
        loop {
            let signal = match notify_rx.recv_timeout(SHUTDOWN_POLL) {
                Err(RecvTimeoutError::Timeout) => {
                    if signal_tx.is_closed() {
                        debug!("Config watcher receiver dropped, stopping");
                        return;
                    }
                    continue;
                }
                Ok(Ok(events)) => {
                    let changed = changed_paths(events, &filter);
                    if changed.is_empty() {
                        continue;
                    }
                    for path in &changed {
                        ctx.cache().invalidate(path);
                    }
                    Ok(changed)
                }
                Ok(Err(e)) => {
                    error!(error = %e, "File watcher error");
                    Err(e.to_string())
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Config watcher channel closed, stopping");
                    return;
                }
            };
            if signal_tx.send(signal).is_err() {
                info!("Config watcher receiver dropped, stopping");
                return;
            }
        }
    });

    let (event_tx, event_rx) = watch::channel(None);
    let live = current.clone();
    let reload_task = tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            let event = match signal {
                Ok(paths) => {
                    debug!(count = paths.len(), name = %request.name, "Reloading config");
                    match resolver.load(&request).await {
                        Ok(config) => {
                            live.store(Arc::new(config));
                            ConfigChangeEvent::Reloaded(paths)
                        }
                        Err(e) => {
                            warn!(name = %request.name, error = %e, "Config reload failed, keeping previous config");
                            ConfigChangeEvent::ReloadFailed {
                                paths,
                                error: e.to_string(),
                            }
                        }
                    }
                }
                Err(message) => ConfigChangeEvent::Error(message),
            };
            if event_tx.send(Some(event)).is_err() {
                return;
            }
        }
    });

    Ok(LiveConfig {
        current,
        events: event_rx,
        watched,
        reload_task,
        _watch_task: watch_task,
    })
}

/// Paths in a debounced batch that can affect the resolution, deduplicated
/// in arrival order.
fn changed_paths(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    filter: &WatchFilter,
) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = Vec::new();
    for event in events {
        if !matches!(
            event.kind,
            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
        ) {
            continue;
        }
        if filter.matches(&event.path) && !changed.contains(&event.path) {
            changed.push(event.path);
        }
    }
    changed
}
