//! Small helpers for working with `serde_json` objects.

use serde_json::{Map, Value};

/// Shallow merge: every top-level key of `overrides` replaces the key in `target`.
///
/// Nested objects are replaced wholesale, never merged.
pub fn merge_top_level(target: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        target.insert(key, value);
    }
}

/// Recursive merge where values from `source` win, and objects present on both
/// sides are merged key by key.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Assigns `value` at a dot-separated `path`, creating intermediate objects.
///
/// An intermediate that exists but is not an object is replaced by one.
pub fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();
    let mut current = target;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_top_level_replaces_nested_objects() {
        let mut target = object(json!({"a": 1, "nested": {"x": 1, "y": 2}}));
        merge_top_level(&mut target, object(json!({"nested": {"x": 5}, "b": 2})));
        assert_eq!(Value::Object(target), json!({"a": 1, "b": 2, "nested": {"x": 5}}));
    }

    #[test]
    fn test_deep_merge_source_wins() {
        let mut target = json!({"en": {"module": {"a": {"hello": "Hello"}}}});
        deep_merge(&mut target, json!({"en": {"module": {"b": {"bye": "Bye"}}}, "fr": {}}));
        assert_eq!(
            target,
            json!({"en": {"module": {"a": {"hello": "Hello"}, "b": {"bye": "Bye"}}}, "fr": {}})
        );

        let mut target = json!({"stretched": true});
        deep_merge(&mut target, json!({"stretched": false}));
        assert_eq!(target, json!({"stretched": false}));
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut target = Map::new();
        set_path(&mut target, "auth.credentials.token", json!("abc"));
        assert_eq!(Value::Object(target), json!({"auth": {"credentials": {"token": "abc"}}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut target = object(json!({"auth": "legacy"}));
        set_path(&mut target, "auth.token", json!(1));
        assert_eq!(Value::Object(target), json!({"auth": {"token": 1}}));
    }
}
