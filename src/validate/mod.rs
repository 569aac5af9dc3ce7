//! Validation of resolved configuration.
//!
//! Validation is never run implicitly by resolution. Problems found in the
//! config are reported as data in a [`ValidationResult`]; only an unloadable
//! schema file is an error.

mod rules;
mod schema;

pub use rules::{CustomValidator, ValidationRule, lookup};
pub use schema::{Schema, SchemaType, TypeName};

use crate::error::SchemaValidationError;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Dot path of the offending value (`server.port`, `hosts[2]`); empty for the root.
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// The check that failed (`type`, `required`, `pattern`, ...).
    pub rule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Stop after the first error.
    pub stop_on_first_error: bool,
    /// Check `required` properties and rules.
    pub validate_required: bool,
    /// Report warnings as errors.
    pub strict: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            stop_on_first_error: false,
            validate_required: true,
            strict: false,
        }
    }
}

/// What to validate against.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A schema file, loaded with [`Schema::from_file`].
    File(PathBuf),
    Schema(Schema),
    Rules(Vec<ValidationRule>),
}

impl From<Schema> for SchemaSource {
    fn from(schema: Schema) -> Self {
        SchemaSource::Schema(schema)
    }
}

impl From<Vec<ValidationRule>> for SchemaSource {
    fn from(rules: Vec<ValidationRule>) -> Self {
        SchemaSource::Rules(rules)
    }
}

impl From<PathBuf> for SchemaSource {
    fn from(path: PathBuf) -> Self {
        SchemaSource::File(path)
    }
}

impl From<&Path> for SchemaSource {
    fn from(path: &Path) -> Self {
        SchemaSource::File(path.to_path_buf())
    }
}

/// Validate `config` against a schema file, a declarative schema or a rule list.
pub async fn validate_configuration(
    config: &Value,
    schema: impl Into<SchemaSource>,
    options: &ValidationOptions,
) -> Result<ValidationResult, SchemaValidationError> {
    match schema.into() {
        SchemaSource::File(path) => {
            let schema = Schema::from_file(&path).await?;
            Ok(validate_schema(config, &schema, options))
        }
        SchemaSource::Schema(schema) => Ok(validate_schema(config, &schema, options)),
        SchemaSource::Rules(rules) => Ok(validate_rules(config, &rules, options)),
    }
}

/// Walk `config` and `schema` together.
pub fn validate_schema(config: &Value, schema: &Schema, options: &ValidationOptions) -> ValidationResult {
    let mut walker = Walker {
        options,
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    walker.walk(config, schema, "");
    finish(walker.errors, walker.warnings, options)
}

/// Apply each rule in order.
pub fn validate_rules(config: &Value, rules: &[ValidationRule], options: &ValidationOptions) -> ValidationResult {
    let mut errors = Vec::new();
    for rule in rules {
        rule.check(config, options, &mut errors);
        if options.stop_on_first_error && !errors.is_empty() {
            errors.truncate(1);
            break;
        }
    }
    finish(errors, Vec::new(), options)
}

fn finish(
    mut errors: Vec<ValidationError>,
    mut warnings: Vec<ValidationError>,
    options: &ValidationOptions,
) -> ValidationResult {
    if options.strict {
        errors.append(&mut warnings);
    }
    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<regex_lite::Regex, String> {
    regex_lite::Regex::new(pattern).map_err(|e| e.to_string())
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

struct Walker<'o> {
    options: &'o ValidationOptions,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
}

impl Walker<'_> {
    fn done(&self) -> bool {
        self.options.stop_on_first_error && !self.errors.is_empty()
    }

    fn error(
        &mut self,
        path: &str,
        rule: &str,
        message: String,
        expected: Option<String>,
        actual: Option<String>,
    ) {
        if self.done() {
            return;
        }
        self.errors.push(ValidationError {
            path: path.to_string(),
            message,
            expected,
            actual,
            rule: rule.to_string(),
        });
    }

    fn walk(&mut self, value: &Value, schema: &Schema, path: &str) {
        if self.done() {
            return;
        }
        let label = if path.is_empty() { "value" } else { path };

        if let Some(expected) = &schema.schema_type
            && !expected.matches(value)
        {
            self.error(
                path,
                "type",
                format!("{label} must be of type {expected}"),
                Some(expected.to_string()),
                Some(TypeName::of(value).to_string()),
            );
            return;
        }

        if let Some(allowed) = &schema.enum_values
            && !allowed.contains(value)
        {
            let allowed = Value::Array(allowed.clone()).to_string();
            self.error(
                path,
                "enum",
                format!("{label} must be one of {allowed}"),
                Some(allowed),
                Some(value.to_string()),
            );
        }

        match value {
            Value::String(s) => self.check_string(s, schema, path, label),
            Value::Number(n) => {
                if let Some(n) = n.as_f64() {
                    self.check_number(n, schema, path, label);
                }
            }
            Value::Array(items) => self.check_array(items, schema, path, label),
            Value::Object(map) => self.check_object(map, schema, path, label),
            _ => {}
        }
    }

    fn check_string(&mut self, s: &str, schema: &Schema, path: &str, label: &str) {
        let len = s.chars().count();
        if let Some(min) = schema.min_length
            && len < min
        {
            self.error(
                path,
                "minLength",
                format!("{label} must be at least {min} characters"),
                Some(format!(">= {min}")),
                Some(len.to_string()),
            );
        }
        if let Some(max) = schema.max_length
            && len > max
        {
            self.error(
                path,
                "maxLength",
                format!("{label} must be at most {max} characters"),
                Some(format!("<= {max}")),
                Some(len.to_string()),
            );
        }
        if let Some(pattern) = &schema.pattern {
            match compile_pattern(pattern) {
                Ok(re) if !re.is_match(s) => self.error(
                    path,
                    "pattern",
                    format!("{label} must match pattern {pattern}"),
                    Some(pattern.clone()),
                    Some(s.to_string()),
                ),
                Ok(_) => {}
                Err(reason) => self.error(
                    path,
                    "pattern",
                    format!("{label} has an invalid pattern: {reason}"),
                    Some(pattern.clone()),
                    None,
                ),
            }
        }
    }

    fn check_number(&mut self, n: f64, schema: &Schema, path: &str, label: &str) {
        if let Some(min) = schema.minimum
            && n < min
        {
            self.error(
                path,
                "minimum",
                format!("{label} must be >= {min}"),
                Some(format!(">= {min}")),
                Some(n.to_string()),
            );
        }
        if let Some(max) = schema.maximum
            && n > max
        {
            self.error(
                path,
                "maximum",
                format!("{label} must be <= {max}"),
                Some(format!("<= {max}")),
                Some(n.to_string()),
            );
        }
    }

    fn check_array(&mut self, items: &[Value], schema: &Schema, path: &str, label: &str) {
        if let Some(min) = schema.min_items
            && items.len() < min
        {
            self.error(
                path,
                "minItems",
                format!("{label} must have at least {min} items"),
                Some(format!(">= {min}")),
                Some(items.len().to_string()),
            );
        }
        if let Some(max) = schema.max_items
            && items.len() > max
        {
            self.error(
                path,
                "maxItems",
                format!("{label} must have at most {max} items"),
                Some(format!("<= {max}")),
                Some(items.len().to_string()),
            );
        }
        if let Some(item_schema) = &schema.items {
            for (i, item) in items.iter().enumerate() {
                self.walk(item, item_schema, &format!("{path}[{i}]"));
                if self.done() {
                    return;
                }
            }
        }
    }

    fn check_object(
        &mut self,
        map: &serde_json::Map<String, Value>,
        schema: &Schema,
        path: &str,
        label: &str,
    ) {
        if self.options.validate_required {
            for key in &schema.required {
                if !map.contains_key(key) {
                    let child = child_path(path, key);
                    self.error(
                        &child,
                        "required",
                        format!("{child} is required"),
                        None,
                        None,
                    );
                }
            }
        }

        if let Some(properties) = &schema.properties {
            for (key, child_schema) in properties {
                if let Some(child) = map.get(key) {
                    self.walk(child, child_schema, &child_path(path, key));
                }
                if self.done() {
                    return;
                }
            }
        }

        if schema.additional_properties == Some(false) {
            let declared = schema.properties.as_ref();
            for key in map.keys() {
                if !declared.is_some_and(|p| p.contains_key(key)) {
                    self.warnings.push(ValidationError {
                        path: child_path(path, key),
                        message: format!("{label} has undeclared property '{key}'"),
                        expected: None,
                        actual: None,
                        rule: "additionalProperties".to_string(),
                    });
                }
            }
        }
    }
}
