//! JSON reference resolution.
//!
//! Stage options may embed references of the form
//! `{"$ref": "<scope>://#/<json-pointer>"}`. Each reference names a scope
//! (for example `metadata:` or `item:`) and a JSON Pointer into that scope's
//! current value. Resolution replaces the whole reference node with the value
//! the pointer designates.
//!
//! ```ignore
//! let scopes = Scopes::new().with("metadata:", &metadata);
//! let options = resolve(&json!({"to": {"$ref": "metadata://#/output"}}), &scopes, true)?;
//! ```

use std::collections::HashMap;

use serde_json::Value;

/// Key marking a mapping as a reference node.
pub const REF_KEY: &str = "$ref";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("unknown scope '{scope}' in reference '{reference}'")]
    UnknownScope { scope: String, reference: String },

    #[error("nothing at '{pointer}' for reference '{reference}'")]
    Unresolvable { pointer: String, reference: String },

    #[error("reference must be a string, got {0}")]
    NotAString(Value),
}

/// Named roots that reference pointers resolve against.
#[derive(Debug, Default, Clone)]
pub struct Scopes<'a> {
    scopes: HashMap<String, &'a Value>,
}

impl<'a> Scopes<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a scope. `metadata:` and `metadata://` name the same scope.
    pub fn with(mut self, name: &str, value: &'a Value) -> Self {
        self.scopes.insert(normalize_scope(name).to_string(), value);
        self
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.scopes.get(normalize_scope(name)).copied()
    }
}

fn normalize_scope(name: &str) -> &str {
    name.trim_end_matches('/')
}

/// Resolve a single reference string such as `metadata://#/encoding`.
pub fn resolve_reference(reference: &str, scopes: &Scopes) -> Result<Value, ReferenceError> {
    let (scope, fragment) = reference.split_once('#').unwrap_or((reference, ""));

    let root = scopes.get(scope).ok_or_else(|| ReferenceError::UnknownScope {
        scope: scope.to_string(),
        reference: reference.to_string(),
    })?;

    root.pointer(fragment)
        .cloned()
        .ok_or_else(|| ReferenceError::Unresolvable {
            pointer: fragment.to_string(),
            reference: reference.to_string(),
        })
}

/// Resolve every reference found in `value`, returning the rebuilt value.
///
/// The walk is depth-first through mappings and sequences; other values are
/// leaves and pass through unchanged. A reference that cannot be resolved is
/// kept as-is when `keep_unknown` is set, so that a later pass with more
/// scopes bound can resolve it. Otherwise the lookup failure is returned.
///
/// A substituted value is not itself searched for further references.
pub fn resolve(value: &Value, scopes: &Scopes, keep_unknown: bool) -> Result<Value, ReferenceError> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get(REF_KEY) {
                let outcome = match reference {
                    Value::String(reference) => resolve_reference(reference, scopes),
                    other => Err(ReferenceError::NotAString(other.clone())),
                };
                return match outcome {
                    Ok(resolved) => Ok(resolved),
                    Err(_) if keep_unknown => Ok(value.clone()),
                    Err(e) => Err(e),
                };
            }

            let mut rebuilt = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                rebuilt.insert(key.clone(), resolve(child, scopes, keep_unknown)?);
            }
            Ok(Value::Object(rebuilt))
        }
        Value::Array(items) => items
            .iter()
            .map(|child| resolve(child, scopes, keep_unknown))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        leaf => Ok(leaf.clone()),
    }
}
