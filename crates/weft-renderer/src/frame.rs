//! Scoped template bindings.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// One scope's bindings.
///
/// A child scope starts as a copy of its parent and overlays its own
/// bindings, so nothing bound in a child is visible to the parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frame(BTreeMap<String, Value>);

impl Frame {
    /// Create an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy this frame for a nested scope.
    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a string binding.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// True if `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Bind `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overlay bindings, later values winning.
    pub fn overlay(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) {
        self.0.extend(bindings);
    }

    /// Bound names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for Frame {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_does_not_leak_into_parent() {
        let mut parent = Frame::new();
        parent.insert("site", "Notes");

        let mut child = parent.child();
        child.insert("section", "Guides");
        child.insert("site", "Overridden");

        assert_eq!(parent.get("section"), None);
        assert_eq!(parent.get_str("site"), Some("Notes"));
        assert_eq!(child.get_str("site"), Some("Overridden"));
    }

    #[test]
    fn test_overlay_replaces_existing() {
        let mut frame = Frame::new();
        frame.insert("a", 1);
        frame.overlay([("a".to_owned(), json!(2)), ("b".to_owned(), json!(3))]);
        assert_eq!(frame.get("a"), Some(&json!(2)));
        assert_eq!(frame.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_serializes_as_object() {
        let mut frame = Frame::new();
        frame.insert("title", "Home");
        assert_eq!(serde_json::to_value(&frame).unwrap(), json!({"title": "Home"}));
    }
}
