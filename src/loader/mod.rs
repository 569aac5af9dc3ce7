//! Config file discovery and loading.
//!
//! Candidate file names are generated per directory from the config name and
//! optional alias, each stem expanded over the registered extensions. The
//! first candidate that exists is loaded through the [`SourceLoader`] for its
//! extension; a candidate that exists but is broken is an error, never a
//! reason to keep searching.

mod cache;
pub mod package;
pub mod script;
mod sources;

pub use cache::{ConfigCache, FileStamp};
pub use sources::{
    DEFAULT_EXTENSIONS, JsonLoader, LoaderRegistry, ScriptLoader, SourceLoader, YamlLoader,
};

use crate::context::ResolutionContext;
use crate::error::ConfigLoadError;
use crate::merge::{ArrayStrategy, deep_merge_with};
use crate::source::ConfigSource;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Options for loading a single file.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub array_strategy: ArrayStrategy,
    /// Consult and refresh the context's cache.
    pub use_cache: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            array_strategy: ArrayStrategy::Replace,
            use_cache: true,
        }
    }
}

/// A config file that was found and loaded.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The file's object merged over the defaults.
    pub config: Value,
    /// The file's object as exported.
    pub raw: Value,
    pub source: ConfigSource,
}

/// Stems without a name, meant for per-application directories.
const BARE_STEMS: [&str; 2] = ["config", ".config"];

/// `{name}`, `.{name}.config`, `{name}.config`, `.{name}`.
fn named_stems(name: &str) -> [String; 4] {
    [
        name.to_string(),
        format!(".{name}.config"),
        format!("{name}.config"),
        format!(".{name}"),
    ]
}

/// Stems tried when the primary name found nothing: the alias patterns, then
/// the combined `{name}.{alias}` forms.
pub(crate) fn alias_stems(name: &str, alias: &str) -> Vec<String> {
    let mut stems = named_stems(alias).to_vec();
    stems.push(format!("{name}.{alias}.config"));
    stems.push(format!(".{name}.{alias}.config"));
    stems
}

/// Stems for the primary name, optionally preceded by the bare stems.
pub(crate) fn primary_stems(name: &str, include_bare: bool) -> Vec<String> {
    let mut stems: Vec<String> = Vec::new();
    if include_bare {
        stems.extend(BARE_STEMS.iter().map(|s| s.to_string()));
    }
    if !name.is_empty() {
        stems.extend(named_stems(name));
    }
    stems
}

/// Expand stems over extensions, stem-major.
pub(crate) fn expand_stems<'a>(
    dir: &Path,
    stems: &[String],
    extensions: impl Iterator<Item = &'a str> + Clone,
) -> Vec<PathBuf> {
    stems
        .iter()
        .flat_map(|stem| {
            extensions
                .clone()
                .map(move |ext| dir.join(format!("{stem}.{ext}")))
        })
        .collect()
}

/// Every candidate path for `name` (and `alias`) in `dir`, in priority order,
/// over the default extensions.
pub fn generate_config_paths(name: &str, dir: &Path, alias: Option<&str>) -> Vec<PathBuf> {
    generate_config_paths_with(name, dir, alias, DEFAULT_EXTENSIONS.iter().copied())
}

/// [`generate_config_paths`] over an explicit extension list.
pub fn generate_config_paths_with<'a>(
    name: &str,
    dir: &Path,
    alias: Option<&str>,
    extensions: impl Iterator<Item = &'a str> + Clone,
) -> Vec<PathBuf> {
    let mut stems = primary_stems(name, true);
    if let Some(alias) = alias.filter(|a| !a.is_empty()) {
        stems.extend(alias_stems(name, alias));
    }
    expand_stems(dir, &stems, extensions)
}

/// Load the object exported by `path`, through the cache.
///
/// `Ok(None)` when the path does not exist or is not a file.
pub async fn load_object(
    ctx: &ResolutionContext,
    path: &Path,
    use_cache: bool,
) -> Result<Option<Value>, ConfigLoadError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigLoadError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let stamp = FileStamp::from_metadata(&meta);

    if use_cache && let Some(stamp) = stamp {
        if let Some(value) = ctx.cache().get(path, stamp) {
            debug!(path = %path.display(), "Config cache hit");
            ctx.metrics().record_cache_hit();
            return Ok(Some(value));
        }
        ctx.metrics().record_cache_miss();
    }

    let started = Instant::now();
    let loaded = async {
        let loader = ctx.loaders().for_path(path)?;
        let value = loader.load(path).await?;
        ensure_object(path, &value)?;
        Ok::<_, ConfigLoadError>(value)
    }
    .await;

    match loaded {
        Ok(value) => {
            ctx.metrics().record_load(started.elapsed());
            debug!(path = %path.display(), "Loaded config file");
            if use_cache && let Some(stamp) = stamp {
                ctx.cache().insert(path, stamp, value.clone());
            }
            Ok(Some(value))
        }
        Err(e) => {
            ctx.metrics().record_failure();
            Err(e)
        }
    }
}

fn ensure_object(path: &Path, value: &Value) -> Result<(), ConfigLoadError> {
    if value.is_object() {
        return Ok(());
    }
    Err(ConfigLoadError::NotAnObject {
        path: path.to_path_buf(),
        found: describe(value),
    })
}

/// Article-prefixed JSON type name for error messages.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Load one candidate and merge it over `defaults`.
pub async fn load_from_path(
    ctx: &ResolutionContext,
    path: &Path,
    defaults: &Value,
    options: &LoadOptions,
) -> Result<Option<LoadedConfig>, ConfigLoadError> {
    let Some(raw) = load_object(ctx, path, options.use_cache).await? else {
        return Ok(None);
    };
    let config = deep_merge_with(defaults.clone(), raw.clone(), options.array_strategy);
    Ok(Some(LoadedConfig {
        config,
        raw,
        source: ConfigSource::file(path),
    }))
}

/// Load the first candidate that exists.
pub async fn try_load_from_paths(
    ctx: &ResolutionContext,
    paths: &[PathBuf],
    defaults: &Value,
    options: &LoadOptions,
) -> Result<Option<LoadedConfig>, ConfigLoadError> {
    for path in paths {
        if let Some(loaded) = load_from_path(ctx, path, defaults, options).await? {
            return Ok(Some(loaded));
        }
    }
    Ok(None)
}

/// Existing config files in `dir`.
///
/// With a name, these are the existing candidates of
/// [`generate_config_paths`] in priority order. Without one, any file with a
/// registered extension named `*.config.<ext>`, `.<stem>.<ext>` or
/// `config.<ext>`, sorted by path.
pub async fn discover_config_files(
    ctx: &ResolutionContext,
    dir: &Path,
    name: Option<&str>,
    alias: Option<&str>,
) -> std::io::Result<Vec<PathBuf>> {
    if let Some(name) = name {
        let candidates = generate_config_paths_with(name, dir, alias, ctx.loaders().extensions());
        let mut found = Vec::new();
        for path in candidates {
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                found.push(path);
            }
        }
        return Ok(found);
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && looks_like_config(ctx.loaders(), &path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Heuristic for unnamed discovery.
pub(crate) fn looks_like_config(loaders: &LoaderRegistry, path: &Path) -> bool {
    let (Some(stem), Some(ext)) = (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) else {
        return false;
    };
    if loaders.get(ext).is_none() {
        return false;
    }
    stem == "config" || stem.ends_with(".config") || (stem.starts_with('.') && stem.len() > 1)
}

/// Load `paths` concurrently to warm the context's cache.
///
/// Failures are logged and skipped; the paths that loaded are returned in
/// input order.
pub async fn preload(ctx: &ResolutionContext, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut set = JoinSet::new();
    for (index, path) in paths.into_iter().enumerate() {
        let ctx = ctx.clone();
        set.spawn(async move {
            let result = load_object(&ctx, &path, true).await;
            (index, path, result)
        });
    }

    let mut loaded = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, path, Ok(Some(_)))) => loaded.push((index, path)),
            Ok((_, _, Ok(None))) => {}
            Ok((_, path, Err(e))) => {
                warn!(path = %path.display(), error = %e, "Preload failed");
            }
            Err(e) => warn!(error = %e, "Preload task failed"),
        }
    }
    loaded.sort_by_key(|(index, _)| *index);
    loaded.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_generate_paths_order() {
        let paths = generate_config_paths("app", Path::new("/d"), None);
        assert_eq!(paths.len(), 6 * 7);
        let names = names(&paths);
        assert_eq!(
            &names[..8],
            [
                "config.ts",
                "config.js",
                "config.mjs",
                "config.cjs",
                "config.json",
                "config.mts",
                "config.cts",
                ".config.ts"
            ]
        );
        assert_eq!(names[14], "app.ts");
        assert_eq!(names[21], ".app.config.ts");
        assert_eq!(names[28], "app.config.ts");
        assert_eq!(names[35], ".app.ts");
    }

    #[test]
    fn test_generate_paths_with_alias() {
        let paths = generate_config_paths("app", Path::new("/d"), Some("tool"));
        assert_eq!(paths.len(), 12 * 7);
        let names = names(&paths);
        assert_eq!(names[42], "tool.ts");
        assert_eq!(names[70], "app.tool.config.ts");
        assert_eq!(names[77], ".app.tool.config.ts");
    }

    #[test]
    fn test_generate_paths_empty_name() {
        let paths = generate_config_paths("", Path::new("/d"), None);
        assert_eq!(paths.len(), 2 * 7);
    }

    #[tokio::test]
    async fn test_load_from_path_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.config.json");
        std::fs::write(&path, r#"{"host": "custom-host"}"#).unwrap();

        let ctx = ResolutionContext::new();
        let loaded = load_from_path(
            &ctx,
            &path,
            &json!({"port": 3000, "host": "localhost"}),
            &LoadOptions::default(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(loaded.config, json!({"port": 3000, "host": "custom-host"}));
        assert_eq!(loaded.raw, json!({"host": "custom-host"}));
        assert_eq!(loaded.source.path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let ctx = ResolutionContext::new();
        let result = load_from_path(
            &ctx,
            &dir.path().join("nope.json"),
            &json!({}),
            &LoadOptions::default(),
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_non_object_export_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.config.ts");
        std::fs::write(&path, "export default 'oops'").unwrap();

        let ctx = ResolutionContext::new();
        let err = load_from_path(&ctx, &path, &json!({}), &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotAnObject { found: "a string", .. }));
        assert_eq!(ctx.metrics().snapshot().failures, 1);
        assert!(ctx.cache().is_empty());
    }

    #[tokio::test]
    async fn test_try_load_first_existing_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.config.json"), r#"{"a": 2}"#).unwrap();
        std::fs::write(dir.path().join(".app.ts"), "export default { a: 3 }").unwrap();

        let ctx = ResolutionContext::new();
        let paths = generate_config_paths("app", dir.path(), None);
        let loaded = try_load_from_paths(&ctx, &paths, &json!({"a": 1}), &LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.config, json!({"a": 2}));
    }

    #[tokio::test]
    async fn test_try_load_stops_at_broken_candidate() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.ts"), "export default [1]").unwrap();
        std::fs::write(dir.path().join("app.config.json"), r#"{"a": 2}"#).unwrap();

        let ctx = ResolutionContext::new();
        let paths = generate_config_paths("app", dir.path(), None);
        let result =
            try_load_from_paths(&ctx, &paths, &json!({}), &LoadOptions::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cache_hit_and_edit_detection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.config.json");
        std::fs::write(&path, r#"{"v": 1}"#).unwrap();

        let ctx = ResolutionContext::new();
        assert_eq!(load_object(&ctx, &path, true).await.unwrap(), Some(json!({"v": 1})));
        assert_eq!(load_object(&ctx, &path, true).await.unwrap(), Some(json!({"v": 1})));

        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.file_loads, 1);
        assert_eq!(snap.cache_hits, 1);

        // Different length, so the stamp changes even within one mtime tick.
        std::fs::write(&path, r#"{"v": 22}"#).unwrap();
        assert_eq!(load_object(&ctx, &path, true).await.unwrap(), Some(json!({"v": 22})));
        assert_eq!(ctx.metrics().snapshot().file_loads, 2);
    }

    #[tokio::test]
    async fn test_discover_named() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("config.ts"), "export default {}").unwrap();
        std::fs::write(dir.path().join("other.config.json"), "{}").unwrap();

        let ctx = ResolutionContext::new();
        let found = discover_config_files(&ctx, dir.path(), Some("app"), None)
            .await
            .unwrap();
        assert_eq!(names(&found), ["config.ts", "app.config.json"]);
    }

    #[tokio::test]
    async fn test_discover_unnamed() {
        let dir = TempDir::new().unwrap();
        for file in ["a.config.ts", ".b.json", "config.js", "readme.md", "plain.json"] {
            std::fs::write(dir.path().join(file), "{}").unwrap();
        }

        let ctx = ResolutionContext::new();
        let found = discover_config_files(&ctx, dir.path(), None, None).await.unwrap();
        assert_eq!(names(&found), [".b.json", "a.config.ts", "config.js"]);
    }

    #[tokio::test]
    async fn test_discover_missing_dir() {
        let ctx = ResolutionContext::new();
        let found = discover_config_files(&ctx, Path::new("/no/such/dir"), None, None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_preload_collects_successes() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.json");
        let bad = dir.path().join("b.json");
        let missing = dir.path().join("c.json");
        std::fs::write(&good, r#"{"ok": true}"#).unwrap();
        std::fs::write(&bad, "not json").unwrap();

        let ctx = ResolutionContext::new();
        let loaded = preload(&ctx, vec![good.clone(), bad, missing]).await;
        assert_eq!(loaded, vec![good]);
        assert_eq!(ctx.cache().len(), 1);
    }
}
