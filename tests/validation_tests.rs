//! Integration tests for validating resolved configuration.

mod common;

use common::{resolver, write};
use serde_json::json;
use tempfile::TempDir;
use tierconf::validate::{Schema, TypeName};
use tierconf::{ConfigRequest, ValidationOptions, ValidationRule, validate_configuration};

/// A JSON schema file for a small server config.
fn server_schema_json() -> &'static str {
    r#"{
      "type": "object",
      "required": ["port", "host"],
      "properties": {
        "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
        "host": { "type": "string", "minLength": 1 },
        "mode": { "enum": ["dev", "prod"] }
      },
      "additionalProperties": false
    }"#
}

#[tokio::test]
async fn test_resolved_config_checked_against_inferred_schema() {
    let project = TempDir::new().unwrap();
    write(
        project.path(),
        "myapp.config.ts",
        "export default { port: 'not-a-port' }",
    );
    let defaults = json!({"port": 3000, "host": "localhost"});
    let request = ConfigRequest::new("myapp", defaults.clone()).cwd(project.path());

    let config = resolver(&[], None).load(&request).await.unwrap();
    let result = validate_configuration(&config, Schema::infer(&defaults), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "port");
    assert_eq!(result.errors[0].rule, "type");
    assert_eq!(result.errors[0].actual.as_deref(), Some("string"));
}

#[tokio::test]
async fn test_schema_file_json() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.json", server_schema_json());

    let good = json!({"port": 8080, "host": "example.com", "mode": "prod"});
    let result = validate_configuration(&good, schema.as_path(), &ValidationOptions::default())
        .await
        .unwrap();
    assert!(result.is_valid, "{:?}", result.errors);

    let bad = json!({"port": 70000, "mode": "staging", "debug": true});
    let result = validate_configuration(&bad, schema.as_path(), &ValidationOptions::default())
        .await
        .unwrap();
    assert!(!result.is_valid);
    let rules: Vec<&str> = result.errors.iter().map(|e| e.rule.as_str()).collect();
    assert!(rules.contains(&"required"));
    assert!(rules.contains(&"maximum"));
    assert!(rules.contains(&"enum"));
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].path, "debug");
}

#[tokio::test]
async fn test_strict_promotes_warnings() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.json", server_schema_json());
    let config = json!({"port": 1, "host": "h", "extra": 1});

    let lax = validate_configuration(&config, schema.as_path(), &ValidationOptions::default())
        .await
        .unwrap();
    assert!(lax.is_valid);
    assert_eq!(lax.warnings.len(), 1);

    let strict = ValidationOptions {
        strict: true,
        ..ValidationOptions::default()
    };
    let result = validate_configuration(&config, schema.as_path(), &strict)
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.errors[0].rule, "additionalProperties");
}

#[tokio::test]
async fn test_schema_file_yaml_and_script() {
    let dir = TempDir::new().unwrap();
    let yaml = write(
        dir.path(),
        "schema.yaml",
        "type: object\nproperties:\n  name:\n    type: string\n    pattern: '^[a-z]+$'\n",
    );
    let script = write(
        dir.path(),
        "schema.ts",
        "export default { type: 'object', required: ['name'] } satisfies object",
    );

    let config = json!({"name": "Upper"});
    let result = validate_configuration(&config, yaml.as_path(), &ValidationOptions::default())
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].rule, "pattern");

    let result = validate_configuration(&json!({}), script.as_path(), &ValidationOptions::default())
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "name");
}

#[tokio::test]
async fn test_unloadable_schema_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let not_object = write(dir.path(), "list.json", "[1, 2]");
    let unsupported = write(dir.path(), "schema.toml", "type = 'object'");

    for path in [missing, not_object, unsupported] {
        let err = validate_configuration(&json!({}), path.as_path(), &ValidationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.path, path);
    }
}

#[tokio::test]
async fn test_rules_over_resolved_config() {
    let project = TempDir::new().unwrap();
    let request = ConfigRequest::new(
        "myapp",
        json!({"server": {"port": 3000, "host": "localhost"}, "tags": ["a"]}),
    )
    .cwd(project.path());
    let config = resolver(&[("MYAPP_SERVER_PORT", "80")], None)
        .load(&request)
        .await
        .unwrap();

    let rules = vec![
        ValidationRule::new("server.port")
            .required()
            .of_type(TypeName::Integer)
            .min(1024.0)
            .message("unprivileged port required"),
        ValidationRule::new("server.host").pattern("^[a-z.]+$"),
        ValidationRule::new("tags").max(0.0),
        ValidationRule::new("auth.token").required(),
    ];

    let result = validate_configuration(&config, rules.clone(), &ValidationOptions::default())
        .await
        .unwrap();
    let failed: Vec<(&str, &str)> = result
        .errors
        .iter()
        .map(|e| (e.path.as_str(), e.rule.as_str()))
        .collect();
    assert_eq!(
        failed,
        [("server.port", "min"), ("tags", "max"), ("auth.token", "required")]
    );
    assert_eq!(result.errors[0].message, "unprivileged port required");

    let first_only = ValidationOptions {
        stop_on_first_error: true,
        ..ValidationOptions::default()
    };
    let result = validate_configuration(&config, rules, &first_only).await.unwrap();
    assert_eq!(result.errors.len(), 1);
}
