//! Tiered resolution.
//!
//! Sources are looked up from the highest tier down (local file, home file,
//! `package.json` section, environment) and merged from the lowest tier up:
//!
//! ```text
//! defaults <- environment <- package.json <- home file <- local file
//! ```
//!
//! Within the local tier the first directory that holds a matching file wins.
//! When nothing is found under the primary name in any tier, the lookup is
//! repeated with the alias.

use crate::context::ResolutionContext;
use crate::env::{EnvOptions, KindTable, apply_with_kinds};
use crate::error::{ConfigError, ConfigLoadError, Result};
use crate::loader::package::load_package_section;
use crate::loader::{LoadOptions, alias_stems, expand_stems, primary_stems, try_load_from_paths};
use crate::merge::{ArrayStrategy, deep_merge_with};
use crate::paths::SearchPaths;
use crate::source::ConfigSource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

macro_rules! step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// What to resolve.
#[derive(Debug, Clone)]
pub struct ConfigRequest<T> {
    /// Config name. Empty skips file and manifest discovery.
    pub name: String,
    /// Secondary name, tried only when the primary name finds nothing.
    pub alias: Option<String>,
    /// Project root. Defaults to the process working directory.
    pub cwd: Option<PathBuf>,
    /// Extra local directory searched before the conventional ones.
    pub config_dir: Option<PathBuf>,
    pub default_config: T,
    pub array_strategy: ArrayStrategy,
    /// Log each resolution step at info level.
    pub verbose: bool,
    /// Apply environment variable overrides.
    pub check_env: bool,
    pub env: EnvOptions,
    /// Use the context's file cache.
    pub use_cache: bool,
    /// Remote endpoint for [`crate::http`] resolution.
    pub endpoint: Option<String>,
    /// Extra request headers for [`crate::http`] resolution.
    pub headers: BTreeMap<String, String>,
}

impl<T> ConfigRequest<T> {
    pub fn new(name: impl Into<String>, default_config: T) -> Self {
        Self {
            name: name.into(),
            alias: None,
            cwd: None,
            config_dir: None,
            default_config,
            array_strategy: ArrayStrategy::Replace,
            verbose: false,
            check_env: true,
            env: EnvOptions::default(),
            use_cache: true,
            endpoint: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn array_strategy(mut self, strategy: ArrayStrategy) -> Self {
        self.array_strategy = strategy;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn check_env(mut self, check_env: bool) -> Self {
        self.check_env = check_env;
        self
    }

    pub fn env_options(mut self, options: EnvOptions) -> Self {
        self.env = options;
        self
    }

    /// Shorthand for a custom environment variable prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env.prefix = Some(prefix.into());
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The effective project root.
    pub fn resolved_cwd(&self) -> PathBuf {
        self.cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub(crate) fn search_paths(&self, home: Option<&Path>) -> SearchPaths {
        SearchPaths::discover(&self.resolved_cwd(), self.config_dir.as_deref(), &self.name, home)
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            array_strategy: self.array_strategy,
            use_cache: self.use_cache,
        }
    }

    fn non_empty_alias(&self) -> Option<&str> {
        self.alias.as_deref().filter(|a| !a.is_empty())
    }
}

/// A resolved config and the layers it was merged from, lowest priority first.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub config: T,
    pub sources: Vec<ConfigSource>,
}

/// A best-effort resolution: everything that could be merged, plus every
/// hard error that stopped a tier.
#[derive(Debug)]
pub struct LenientResolution<T> {
    pub config: T,
    pub sources: Vec<ConfigSource>,
    pub errors: Vec<ConfigError>,
}

impl<T> LenientResolution<T> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Untyped result of one resolution.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub config: Value,
    pub sources: Vec<ConfigSource>,
    pub errors: Vec<ConfigError>,
}

#[derive(Debug, Clone, Copy)]
enum Pass<'a> {
    Primary,
    Alias(&'a str),
}

/// Resolves requests against a shared [`ResolutionContext`].
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    ctx: ResolutionContext,
}

impl Resolver {
    pub fn new(ctx: ResolutionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    /// Resolve a request. Any malformed source is an error.
    pub async fn resolve<T>(&self, request: &ConfigRequest<T>) -> Result<Resolved<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let defaults = to_value(&request.default_config)?;
        let outcome = self.resolve_value(request, defaults).await;
        if let Some(error) = outcome.errors.into_iter().next() {
            return Err(error);
        }
        let config = from_value(&request.name, outcome.config)?;
        Ok(Resolved {
            config,
            sources: outcome.sources,
        })
    }

    /// Resolve a request, returning the typed config only.
    pub async fn load<T>(&self, request: &ConfigRequest<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        self.resolve(request).await.map(|resolved| resolved.config)
    }

    /// Resolve a request without failing.
    ///
    /// When a tier is malformed, the result holds the merge of every layer
    /// found before it (the defaults if the first tier failed). If the merged
    /// value does not fit `T`, the defaults are returned.
    pub async fn resolve_lenient<T>(&self, request: &ConfigRequest<T>) -> LenientResolution<T>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let defaults = match to_value(&request.default_config) {
            Ok(defaults) => defaults,
            Err(e) => {
                return LenientResolution {
                    config: request.default_config.clone(),
                    sources: vec![ConfigSource::default_config()],
                    errors: vec![e],
                };
            }
        };

        let mut outcome = self.resolve_value(request, defaults).await;
        for error in &outcome.errors {
            warn!(name = %request.name, error = %error, "Config source rejected");
        }
        let config = match from_value(&request.name, outcome.config) {
            Ok(config) => config,
            Err(e) => {
                outcome.errors.push(e);
                outcome.sources.truncate(1);
                request.default_config.clone()
            }
        };
        LenientResolution {
            config,
            sources: outcome.sources,
            errors: outcome.errors,
        }
    }

    pub(crate) async fn resolve_value<T>(&self, request: &ConfigRequest<T>, defaults: Value) -> Outcome {
        self.ctx.metrics().record_resolution();
        let verbose = request.verbose;
        step!(verbose, name = %request.name, "Resolving config");

        let mut errors = Vec::new();
        let mut layers: Vec<(Value, ConfigSource)> = Vec::new();

        if !request.name.is_empty() {
            let paths = request.search_paths(self.ctx.home_dir());
            let mut found = self
                .discover_layers(request, &paths, Pass::Primary, &mut layers)
                .await;
            if found.is_ok()
                && layers.is_empty()
                && let Some(alias) = request.non_empty_alias()
            {
                step!(verbose, name = %request.name, alias = %alias, "Nothing found under primary name, trying alias");
                found = self
                    .discover_layers(request, &paths, Pass::Alias(alias), &mut layers)
                    .await;
            }
            if let Err(e) = found {
                errors.push(ConfigError::from(e));
            }
        }

        let mut config = defaults;
        let mut sources = vec![ConfigSource::default_config()];

        if errors.is_empty() && request.check_env {
            let kinds = KindTable::from_value(&config);
            let options = EnvOptions {
                verbose: request.verbose || request.env.verbose,
                ..request.env.clone()
            };
            match apply_with_kinds(&request.name, &config, &kinds, self.ctx.env(), &options) {
                Ok(applied) => {
                    if let Some(source) = applied.source {
                        step!(verbose, count = applied.applied.len(), "Applied environment overrides");
                        sources.push(source);
                    }
                    config = applied.config;
                }
                Err(e) => errors.push(e.into()),
            }
        }

        for (raw, source) in layers.into_iter().rev() {
            config = deep_merge_with(config, raw, request.array_strategy);
            sources.push(source);
        }

        Outcome {
            config,
            sources,
            errors,
        }
    }

    /// Collect file and manifest layers, highest priority first. Stops at
    /// the first malformed source, keeping what was already collected.
    async fn discover_layers<T>(
        &self,
        request: &ConfigRequest<T>,
        paths: &SearchPaths,
        pass: Pass<'_>,
        layers: &mut Vec<(Value, ConfigSource)>,
    ) -> std::result::Result<(), ConfigLoadError> {
        let name = request.name.as_str();
        let (local_stems, home_stems, package_key) = match pass {
            Pass::Primary => (primary_stems(name, false), primary_stems(name, true), name),
            Pass::Alias(alias) => (alias_stems(name, alias), alias_stems(name, alias), alias),
        };
        let options = request.load_options();
        let extensions = self.ctx.loaders().extensions();
        let empty = Value::Object(Map::new());

        for dir in &paths.local_dirs {
            let candidates = expand_stems(dir, &local_stems, extensions.clone());
            if let Some(loaded) = try_load_from_paths(&self.ctx, &candidates, &empty, &options).await? {
                step!(request.verbose, source = %loaded.source, "Found local config");
                layers.push((loaded.raw, loaded.source));
                break;
            }
        }

        if let Some(home) = &paths.home_dir {
            let candidates = expand_stems(home, &home_stems, extensions.clone());
            if let Some(loaded) = try_load_from_paths(&self.ctx, &candidates, &empty, &options).await? {
                let source = loaded
                    .source
                    .path
                    .clone()
                    .map(ConfigSource::home_file)
                    .unwrap_or(loaded.source);
                step!(request.verbose, source = %source, "Found home config");
                layers.push((loaded.raw, source));
            }
        }

        if let Some(section) =
            load_package_section(&self.ctx, &paths.package_manifest, package_key, options.use_cache).await?
        {
            step!(request.verbose, key = %package_key, "Found package.json section");
            layers.push((section, ConfigSource::package(&paths.package_manifest)));
        }

        Ok(())
    }
}

fn to_value<T: Serialize>(config: &T) -> Result<Value> {
    serde_json::to_value(config).map_err(|e| ConfigError::Serialize(e.to_string()))
}

fn from_value<T: DeserializeOwned>(name: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| ConfigError::Deserialize {
        name: name.to_string(),
        source,
    })
}

/// Resolve `request` against the process environment and home directory.
///
/// Absence of every source is not an error: the result is then the defaults.
pub async fn load_config<T>(request: ConfigRequest<T>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    Resolver::new(ResolutionContext::from_process())
        .load(&request)
        .await
}
