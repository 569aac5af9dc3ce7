//! Per-extension file loaders.

use super::script;
use crate::error::ConfigLoadError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Turns a config file into a value.
///
/// Loaders return whatever the file exports; the caller checks that it is an
/// object. A file that exports nothing should fail with
/// [`ConfigLoadError::EmptyModule`].
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Value, ConfigLoadError>;
}

async fn read_source(path: &Path) -> Result<String, ConfigLoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// `.json` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoader;

#[async_trait]
impl SourceLoader for JsonLoader {
    async fn load(&self, path: &Path) -> Result<Value, ConfigLoadError> {
        let text = read_source(path).await?;
        if text.trim().is_empty() {
            return Err(ConfigLoadError::EmptyModule {
                path: path.to_path_buf(),
            });
        }
        serde_json::from_str(&text).map_err(|e| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// `.yaml` / `.yml` files. Not registered by default; see
/// [`LoaderRegistry::with_yaml`].
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlLoader;

#[async_trait]
impl SourceLoader for YamlLoader {
    async fn load(&self, path: &Path) -> Result<Value, ConfigLoadError> {
        let text = read_source(path).await?;
        let value: Value = serde_yaml::from_str(&text).map_err(|e| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if value.is_null() && text.trim().is_empty() {
            return Err(ConfigLoadError::EmptyModule {
                path: path.to_path_buf(),
            });
        }
        Ok(value)
    }
}

/// Script modules (`.ts`, `.js`, `.mjs`, `.cjs`, `.mts`, `.cts`), evaluated
/// as data. See [`script`] for the supported subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptLoader;

#[async_trait]
impl SourceLoader for ScriptLoader {
    async fn load(&self, path: &Path) -> Result<Value, ConfigLoadError> {
        let text = read_source(path).await?;
        let module = script::evaluate(&text).map_err(|e| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        match module.export_value() {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(ConfigLoadError::NotAnObject {
                path: path.to_path_buf(),
                found: "undefined",
            }),
            None => Err(ConfigLoadError::EmptyModule {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Extensions tried for every candidate stem, in order.
pub const DEFAULT_EXTENSIONS: [&str; 7] = ["ts", "js", "mjs", "cjs", "json", "mts", "cts"];

/// Ordered mapping from file extension to loader.
///
/// Registration order is the order in which extensions are tried for each
/// candidate file name.
#[derive(Clone)]
pub struct LoaderRegistry {
    loaders: Vec<(String, Arc<dyn SourceLoader>)>,
}

impl LoaderRegistry {
    /// A registry with no loaders.
    pub fn empty() -> Self {
        Self { loaders: Vec::new() }
    }

    /// Register a loader for an extension (without the dot). Re-registering an
    /// extension replaces its loader in place.
    pub fn register(&mut self, extension: impl Into<String>, loader: Arc<dyn SourceLoader>) {
        let extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        match self.loaders.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(slot) => slot.1 = loader,
            None => self.loaders.push((extension, loader)),
        }
    }

    pub fn with(mut self, extension: impl Into<String>, loader: Arc<dyn SourceLoader>) -> Self {
        self.register(extension, loader);
        self
    }

    /// Add `.yaml` and `.yml` after the default extensions.
    pub fn with_yaml(self) -> Self {
        let yaml: Arc<dyn SourceLoader> = Arc::new(YamlLoader);
        self.with("yaml", yaml.clone()).with("yml", yaml)
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn SourceLoader>> {
        let extension = extension.to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, loader)| loader.clone())
    }

    /// Loader for a path's final extension.
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn SourceLoader>, ConfigLoadError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.get(extension)
            .ok_or_else(|| ConfigLoadError::UnsupportedExtension {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> + Clone {
        self.loaders.iter().map(|(ext, _)| ext.as_str())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let script: Arc<dyn SourceLoader> = Arc::new(ScriptLoader);
        let json: Arc<dyn SourceLoader> = Arc::new(JsonLoader);
        let mut registry = Self::empty();
        for ext in DEFAULT_EXTENSIONS {
            let loader = if ext == "json" { json.clone() } else { script.clone() };
            registry.register(ext, loader);
        }
        registry
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.extensions()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_extension_order() {
        let registry = LoaderRegistry::default();
        let exts: Vec<&str> = registry.extensions().collect();
        assert_eq!(exts, DEFAULT_EXTENSIONS);
        assert!(registry.get("yaml").is_none());
    }

    #[test]
    fn test_with_yaml_appends() {
        let registry = LoaderRegistry::default().with_yaml();
        let exts: Vec<&str> = registry.extensions().collect();
        assert_eq!(&exts[7..], ["yaml", "yml"]);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let registry = LoaderRegistry::default().with(".JSON", Arc::new(YamlLoader));
        let exts: Vec<&str> = registry.extensions().collect();
        assert_eq!(exts, DEFAULT_EXTENSIONS);
    }

    #[test]
    fn test_unsupported_extension() {
        let registry = LoaderRegistry::default();
        let err = registry.for_path(Path::new("/x/app.config.toml")).err().unwrap();
        assert!(matches!(err, ConfigLoadError::UnsupportedExtension { ref extension, .. } if extension == "toml"));
    }

    #[tokio::test]
    async fn test_json_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, r#"{"port": 1}"#).unwrap();
        assert_eq!(JsonLoader.load(&path).await.unwrap(), json!({"port": 1}));

        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            JsonLoader.load(&path).await,
            Err(ConfigLoadError::Parse { .. })
        ));

        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            JsonLoader.load(&path).await,
            Err(ConfigLoadError::EmptyModule { .. })
        ));
    }

    #[tokio::test]
    async fn test_yaml_loader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, "server:\n  port: 8080\n  tags: [a, b]\n").unwrap();
        assert_eq!(
            YamlLoader.load(&path).await.unwrap(),
            json!({"server": {"port": 8080, "tags": ["a", "b"]}})
        );
    }

    #[tokio::test]
    async fn test_script_loader_outcomes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.config.ts");

        std::fs::write(&path, "export default { port: 1 }").unwrap();
        assert_eq!(ScriptLoader.load(&path).await.unwrap(), json!({"port": 1}));

        std::fs::write(&path, "// empty\n").unwrap();
        assert!(matches!(
            ScriptLoader.load(&path).await,
            Err(ConfigLoadError::EmptyModule { .. })
        ));

        std::fs::write(&path, "export default undefined").unwrap();
        assert!(matches!(
            ScriptLoader.load(&path).await,
            Err(ConfigLoadError::NotAnObject { found: "undefined", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let err = JsonLoader.load(Path::new("/definitely/not/here.json")).await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Read { .. }));
    }
}
