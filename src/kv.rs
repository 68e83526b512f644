//! KV Patch Engine
//!
//! A persona's KV document is a single JSON object. Each `kv_set` chain
//! entry carries a [`KvPatch`] that is merged into it.
//!
//! Merge order is fixed: every `set` is applied first, then every `del`.
//! A key that appears in both ends up absent. Unknown `del` keys are
//! no-ops. The result replaces the stored document wholesale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Set/delete operations against a persona's KV document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KvPatch {
    /// Keys to insert or overwrite.
    #[serde(default)]
    pub set: BTreeMap<String, Value>,
    /// Keys to remove.
    #[serde(default)]
    pub del: Vec<String>,
}

impl KvPatch {
    /// Patch that only sets keys.
    pub fn setting<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            set: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            del: Vec::new(),
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.del.is_empty()
    }
}

/// Apply a patch to the current content (`None` = empty object).
///
/// Non-object content is treated as empty; the document root is always
/// an object.
pub fn apply_patch(current: Option<&Value>, patch: &KvPatch) -> Value {
    let mut content: Map<String, Value> = match current {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    for (key, value) in &patch.set {
        content.insert(key.clone(), value.clone());
    }

    for key in &patch.del {
        content.remove(key);
    }

    Value::Object(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_delete_same_key() {
        let patch = KvPatch {
            set: BTreeMap::from([("a".to_string(), json!(1))]),
            del: vec!["a".to_string()],
        };
        assert_eq!(apply_patch(None, &patch), json!({}));
    }

    #[test]
    fn test_set_overwrites() {
        let current = json!({"bio": "old", "keep": true});
        let patch = KvPatch::setting([("bio", json!("hi"))]);
        assert_eq!(
            apply_patch(Some(&current), &patch),
            json!({"bio": "hi", "keep": true})
        );
    }

    #[test]
    fn test_unknown_delete_is_noop() {
        let current = json!({"a": 1});
        let patch = KvPatch {
            set: BTreeMap::new(),
            del: vec!["missing".to_string()],
        };
        assert_eq!(apply_patch(Some(&current), &patch), json!({"a": 1}));
    }

    #[test]
    fn test_non_object_root_reset() {
        let current = json!([1, 2, 3]);
        let patch = KvPatch::setting([("x", json!(null))]);
        assert_eq!(apply_patch(Some(&current), &patch), json!({"x": null}));
    }

    #[test]
    fn test_reapply_is_stable() {
        let patch = KvPatch {
            set: BTreeMap::from([("a".to_string(), json!({"nested": [1, 2]}))]),
            del: vec!["b".to_string()],
        };
        let once = apply_patch(Some(&json!({"b": 2})), &patch);
        let twice = apply_patch(Some(&once), &patch);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_defaults() {
        let patch: KvPatch = serde_json::from_str(r#"{"set":{"k":"v"}}"#).unwrap();
        assert!(patch.del.is_empty());
        assert!(!patch.is_empty());
        assert!(KvPatch::default().is_empty());
    }
}
