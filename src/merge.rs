//! Deep merge for JSON-shaped configuration values.
//!
//! Implements field-by-field merging where the overlay (higher tier) wins over
//! the base (lower tier). Objects merge recursively; arrays follow an
//! [`ArrayStrategy`].
//!
//! A key that is absent from the overlay leaves the base untouched ("not
//! specified"). An explicit `null` in the overlay is a real value and replaces
//! whatever the base held.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How two arrays at the same key combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayStrategy {
    /// The overlay array replaces the base array.
    #[default]
    Replace,
    /// Index-wise merge over the overlap, then the remaining elements
    /// (overlay's first, then base's).
    Merge,
}

impl std::fmt::Display for ArrayStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayStrategy::Replace => write!(f, "replace"),
            ArrayStrategy::Merge => write!(f, "merge"),
        }
    }
}

/// Deep merge two JSON values with `overlay` taking precedence, replacing arrays.
///
/// # Example
/// ```
/// use serde_json::json;
/// use tierconf::deep_merge;
///
/// let base = json!({
///     "server": { "port": 8080, "host": "localhost" },
///     "features": ["a", "b"]
/// });
/// let overlay = json!({
///     "server": { "port": 9000 },
///     "features": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(
///     result,
///     json!({ "server": { "port": 9000, "host": "localhost" }, "features": ["c"] })
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    deep_merge_with(base, overlay, ArrayStrategy::Replace)
}

/// Deep merge two JSON values with an explicit array strategy.
///
/// Both inputs are taken by value, so neither caller-held value can be
/// observed in a modified state. Recursion depth equals the nesting depth of
/// the overlay.
pub fn deep_merge_with(base: Value, overlay: Value, strategy: ArrayStrategy) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = match base_map.remove(&key) {
                    Some(base_value) => deep_merge_with(base_value, overlay_value, strategy),
                    None => overlay_value,
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => match strategy {
            ArrayStrategy::Replace => Value::Array(overlay_items),
            ArrayStrategy::Merge => Value::Array(merge_arrays(base_items, overlay_items, strategy)),
        },
        (_, overlay) => overlay,
    }
}

/// Index-wise array merge.
///
/// Entry `i` of the overlap is the recursive merge of `overlay[i]` over
/// `base[i]` when both are objects, otherwise `overlay[i]`. Overlay's extra
/// elements are appended next, then base's.
fn merge_arrays(base: Vec<Value>, overlay: Vec<Value>, strategy: ArrayStrategy) -> Vec<Value> {
    let overlap = base.len().min(overlay.len());
    let mut merged = Vec::with_capacity(base.len().max(overlay.len()));

    let mut base_iter = base.into_iter();
    let mut overlay_iter = overlay.into_iter();

    for _ in 0..overlap {
        let (Some(b), Some(o)) = (base_iter.next(), overlay_iter.next()) else {
            break;
        };
        if b.is_object() && o.is_object() {
            merged.push(deep_merge_with(b, o, strategy));
        } else {
            merged.push(o);
        }
    }

    merged.extend(overlay_iter);
    merged.extend(base_iter);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_simple_objects() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let base = json!({
            "server": {"host": "localhost", "port": 8080},
            "debug": true
        });
        let overlay = json!({
            "server": {"port": 9000}
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "server": {"host": "localhost", "port": 9000},
                "debug": true
            })
        );
    }

    #[test]
    fn test_arrays_replaced_by_default() {
        let base = json!({"items": [1, 2, 3]});
        let overlay = json!({"items": [4, 5]});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"items": [4, 5]}));
    }

    #[test]
    fn test_array_merge_strategy_index_wise() {
        let base = json!([1, 2, {"a": 1}]);
        let overlay = json!([3, 4, {"b": 2}]);
        let result = deep_merge_with(base, overlay, ArrayStrategy::Merge);
        assert_eq!(result, json!([3, 4, {"a": 1, "b": 2}]));
    }

    #[test]
    fn test_array_merge_short_overlay_keeps_base_tail() {
        let base = json!([{"a": 1}, 2, 3, 4, 5]);
        let overlay = json!([{"b": 2}]);
        let result = deep_merge_with(base, overlay, ArrayStrategy::Merge);
        assert_eq!(result, json!([{"a": 1, "b": 2}, 2, 3, 4, 5]));
    }

    #[test]
    fn test_array_merge_long_overlay_appends_overlay_tail() {
        let base = json!(["x"]);
        let overlay = json!(["y", "z", {"k": true}]);
        let result = deep_merge_with(base, overlay, ArrayStrategy::Merge);
        assert_eq!(result, json!(["y", "z", {"k": true}]));
    }

    #[test]
    fn test_nested_arrays_follow_strategy() {
        let base = json!({"plugins": [{"name": "a", "opts": {"x": 1}}]});
        let overlay = json!({"plugins": [{"opts": {"y": 2}}]});
        let merged = deep_merge_with(base.clone(), overlay.clone(), ArrayStrategy::Merge);
        assert_eq!(
            merged,
            json!({"plugins": [{"name": "a", "opts": {"x": 1, "y": 2}}]})
        );
        let replaced = deep_merge_with(base, overlay, ArrayStrategy::Replace);
        assert_eq!(replaced, json!({"plugins": [{"opts": {"y": 2}}]}));
    }

    #[test]
    fn test_null_overrides_base() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": null, "b": {"c": null}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": null, "b": {"c": null}}));
    }

    #[test]
    fn test_absent_key_preserves_base() {
        let base = json!({"a": 1, "b": {"c": 2, "d": 3}});
        let overlay = json!({"b": {"d": 4}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": {"c": 2, "d": 4}}));
    }

    #[test]
    fn test_merge_is_idempotent_without_arrays() {
        let base = json!({"a": 1, "n": {"x": "y", "z": false}});
        let overlay = json!({"n": {"x": "w"}, "extra": 3});
        let once = deep_merge(base, overlay.clone());
        let twice = deep_merge(once.clone(), overlay);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_deep_nested_merge() {
        let base = json!({
            "level1": {
                "level2": {
                    "level3": {"a": 1, "b": 2}
                }
            }
        });
        let overlay = json!({
            "level1": {
                "level2": {
                    "level3": {"b": 3, "c": 4}
                }
            }
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "level1": {
                    "level2": {
                        "level3": {"a": 1, "b": 3, "c": 4}
                    }
                }
            })
        );
    }

    #[test]
    fn test_very_deep_nesting_survives_shallow_override() {
        let mut deep = json!({"leaf": "bottom"});
        for _ in 0..150 {
            deep = json!({ "next": deep });
        }
        let base = json!({"root": deep, "top": 1});
        let overlay = json!({"top": 2});

        let mut cursor = &deep_merge(base, overlay)["root"];
        for _ in 0..150 {
            cursor = &cursor["next"];
        }
        assert_eq!(cursor["leaf"], json!("bottom"));
    }

    #[test]
    fn test_overlay_replaces_primitive_with_object() {
        let base = json!({"value": 42});
        let overlay = json!({"value": {"nested": true}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_overlay_replaces_object_with_primitive() {
        let base = json!({"value": {"nested": true}});
        let overlay = json!({"value": 42});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": 42}));
    }
}
