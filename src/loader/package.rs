//! Config sections embedded in `package.json`.

use super::{describe, load_object};
use crate::context::ResolutionContext;
use crate::error::ConfigLoadError;
use serde_json::Value;
use std::path::Path;

/// The object under top-level `key` in the manifest at `manifest`.
///
/// `Ok(None)` when the manifest or the key is missing. A key whose value is
/// not an object is an error, as is a manifest that is not a JSON object.
pub async fn load_package_section(
    ctx: &ResolutionContext,
    manifest: &Path,
    key: &str,
    use_cache: bool,
) -> Result<Option<Value>, ConfigLoadError> {
    if key.is_empty() {
        return Ok(None);
    }
    let Some(Value::Object(mut root)) = load_object(ctx, manifest, use_cache).await? else {
        return Ok(None);
    };
    match root.remove(key) {
        None => Ok(None),
        Some(section @ Value::Object(_)) => Ok(Some(section)),
        Some(other) => Err(ConfigLoadError::NotAnObject {
            path: manifest.to_path_buf(),
            found: describe(&other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn section(contents: &str, key: &str) -> Result<Option<Value>, ConfigLoadError> {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, contents).unwrap();
        load_package_section(&ResolutionContext::new(), &manifest, key, false).await
    }

    #[tokio::test]
    async fn test_reads_section() {
        let result = section(r#"{"name": "pkg", "myapp": {"port": 1}}"#, "myapp").await;
        assert_eq!(result.unwrap(), Some(json!({"port": 1})));
    }

    #[tokio::test]
    async fn test_missing_key_or_manifest() {
        assert_eq!(section(r#"{"name": "pkg"}"#, "myapp").await.unwrap(), None);

        let dir = TempDir::new().unwrap();
        let missing = load_package_section(
            &ResolutionContext::new(),
            &dir.path().join("package.json"),
            "myapp",
            false,
        )
        .await
        .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_non_object_section_is_error() {
        let err = section(r#"{"myapp": "yes"}"#, "myapp").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotAnObject { found: "a string", .. }));
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_error() {
        let err = section("{ not json", "myapp").await.unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { .. }));
    }
}
