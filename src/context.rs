//! Shared state for resolutions.

use crate::env::EnvSnapshot;
use crate::loader::{ConfigCache, LoaderRegistry, SourceLoader};
use crate::metrics::LoadMetrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Everything a resolution reads besides its request: the environment, the
/// home directory, registered loaders, the file cache and metrics.
///
/// Cloning is cheap and clones share the cache and metrics.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    env: Arc<EnvSnapshot>,
    home_dir: Option<PathBuf>,
    loaders: Arc<LoaderRegistry>,
    cache: Arc<ConfigCache>,
    metrics: Arc<LoadMetrics>,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::from_process()
    }
}

impl ResolutionContext {
    /// Context reading the process environment and the user's home directory.
    pub fn from_process() -> Self {
        Self {
            env: Arc::new(EnvSnapshot::from_process()),
            home_dir: dirs::home_dir(),
            ..Self::new()
        }
    }

    /// Context with an empty environment and no home directory.
    pub fn new() -> Self {
        Self {
            env: Arc::new(EnvSnapshot::empty()),
            home_dir: None,
            loaders: Arc::new(LoaderRegistry::default()),
            cache: Arc::new(ConfigCache::new()),
            metrics: Arc::new(LoadMetrics::new()),
        }
    }

    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_home_dir(mut self, home: Option<PathBuf>) -> Self {
        self.home_dir = home;
        self
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = Arc::new(loaders);
        self
    }

    /// Register one extra loader (or replace the loader for `extension`).
    pub fn with_loader(mut self, extension: &str, loader: Arc<dyn SourceLoader>) -> Self {
        Arc::make_mut(&mut self.loaders).register(extension, loader);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ConfigCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the cache with a fresh one whose entries expire after `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Arc::new(ConfigCache::with_ttl(ttl));
        self
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn metrics(&self) -> &LoadMetrics {
        &self.metrics
    }
}
