//! Application-wide metadata.

use serde_json::Value;

use crate::item::Fields;

/// Two-layer key/value store shared by every stage of a run.
///
/// The base layer is the configuration handed to the application and is
/// never written. All writes land in the overlay, which shadows the base on
/// reads.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    base: Fields,
    overlay: Fields,
}

impl Metadata {
    pub fn new(base: Fields) -> Self {
        Self {
            base,
            overlay: Fields::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.overlay.get(key).or_else(|| self.base.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.overlay.contains_key(key) || self.base.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.overlay.insert(key.into(), value.into())
    }

    pub fn update(&mut self, values: Fields) {
        self.overlay.extend(values);
    }

    /// Drop a key from the overlay. Base values become visible again.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.overlay.shift_remove(key)
    }

    /// The untouched base layer.
    pub fn base(&self) -> &Fields {
        &self.base
    }

    /// Merged view, overlay winning over base.
    pub fn to_value(&self) -> Value {
        let mut merged = self.base.clone();
        merged.extend(self.overlay.clone());
        Value::Object(merged)
    }
}

static NULL: Value = Value::Null;

impl std::ops::Index<&str> for Metadata {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Fields {
        match json!({"url": "https://x.org", "author": "Ada"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overlay_shadows_base() {
        let original = base();
        let mut metadata = Metadata::new(original.clone());

        metadata.insert("author", "Grace");
        assert_eq!(metadata["author"], json!("Grace"));
        assert_eq!(metadata["url"], json!("https://x.org"));
        assert_eq!(metadata.base(), &original);

        metadata.remove("author");
        assert_eq!(metadata["author"], json!("Ada"));
    }

    #[test]
    fn test_to_value_merges_layers() {
        let mut metadata = Metadata::new(base());
        metadata.update(match json!({"lang": "en"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        });
        let merged = metadata.to_value();
        assert_eq!(merged["lang"], json!("en"));
        assert_eq!(merged["author"], json!("Ada"));
        assert!(metadata.get("missing").is_none());
        assert_eq!(metadata["missing"], Value::Null);
    }
}
