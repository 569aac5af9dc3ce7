//! Path-addressed validation rules.

use super::schema::TypeName;
use super::{ValidationError, ValidationOptions, compile_pattern};
use serde_json::Value;
use std::sync::Arc;

/// Custom check: return a message to report a failure.
pub type CustomValidator = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// A rule applied to the value at a dot-separated path.
///
/// Checks run in order: required, type, min/max, pattern, enum, custom. When
/// `message` is set it replaces the built-in message of every failure.
#[derive(Clone, Default)]
pub struct ValidationRule {
    pub path: String,
    pub required: bool,
    pub rule_type: Option<TypeName>,
    /// Lower bound on a number, or on the length of a string or array.
    pub min: Option<f64>,
    /// Upper bound, with the same meaning as `min`.
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub validator: Option<CustomValidator>,
    pub message: Option<String>,
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRule")
            .field("path", &self.path)
            .field("required", &self.required)
            .field("rule_type", &self.rule_type)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("pattern", &self.pattern)
            .field("enum_values", &self.enum_values)
            .field("validator", &self.validator.is_some())
            .field("message", &self.message)
            .finish()
    }
}

impl ValidationRule {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn of_type(mut self, t: TypeName) -> Self {
        self.rule_type = Some(t);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn validator(
        mut self,
        f: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Run this rule against `config`, appending failures to `errors`.
    pub(crate) fn check(&self, config: &Value, options: &ValidationOptions, errors: &mut Vec<ValidationError>) {
        let value = lookup(config, &self.path);

        let value = match value {
            None | Some(Value::Null) if self.required && options.validate_required => {
                self.fail(errors, "required", format!("{} is required", self.path), None, None);
                return;
            }
            None => return,
            Some(value) => value,
        };

        if let Some(t) = self.rule_type
            && !t.matches(value)
        {
            self.fail(
                errors,
                "type",
                format!("{} must be of type {t}", self.path),
                Some(t.to_string()),
                Some(TypeName::of(value).to_string()),
            );
            return;
        }

        let measured = match value {
            Value::Number(n) => n.as_f64().map(|n| (n, "")),
            Value::String(s) => Some((s.chars().count() as f64, " characters")),
            Value::Array(items) => Some((items.len() as f64, " items")),
            _ => None,
        };
        if let Some((measure, unit)) = measured {
            if let Some(min) = self.min
                && measure < min
            {
                self.fail(
                    errors,
                    "min",
                    format!("{} must be at least {min}{unit}", self.path),
                    Some(format!(">= {min}")),
                    Some(measure.to_string()),
                );
            }
            if let Some(max) = self.max
                && measure > max
            {
                self.fail(
                    errors,
                    "max",
                    format!("{} must be at most {max}{unit}", self.path),
                    Some(format!("<= {max}")),
                    Some(measure.to_string()),
                );
            }
        }

        if let (Some(pattern), Value::String(s)) = (&self.pattern, value) {
            match compile_pattern(pattern) {
                Ok(re) if !re.is_match(s) => self.fail(
                    errors,
                    "pattern",
                    format!("{} must match pattern {pattern}", self.path),
                    Some(pattern.clone()),
                    Some(s.clone()),
                ),
                Ok(_) => {}
                Err(reason) => self.fail(
                    errors,
                    "pattern",
                    format!("{} has an invalid pattern: {reason}", self.path),
                    Some(pattern.clone()),
                    None,
                ),
            }
        }

        if let Some(allowed) = &self.enum_values
            && !allowed.contains(value)
        {
            self.fail(
                errors,
                "enum",
                format!("{} must be one of {}", self.path, Value::Array(allowed.clone())),
                Some(Value::Array(allowed.clone()).to_string()),
                Some(value.to_string()),
            );
        }

        if let Some(validator) = &self.validator
            && let Some(message) = validator(value)
        {
            self.fail(errors, "custom", message, None, Some(value.to_string()));
        }
    }

    fn fail(
        &self,
        errors: &mut Vec<ValidationError>,
        rule: &str,
        default_message: String,
        expected: Option<String>,
        actual: Option<String>,
    ) {
        errors.push(ValidationError {
            path: self.path.clone(),
            message: self.message.clone().unwrap_or(default_message),
            expected,
            actual,
            rule: rule.to_string(),
        });
    }
}

/// Resolve a dot path. Any missing segment (or a non-object on the way) is
/// absence.
pub fn lookup<'a>(config: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(config);
    }
    path.split('.').try_fold(config, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
