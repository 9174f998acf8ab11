//! Records flowing through the pipeline.
//!
//! An [`Item`] is a mapping from string keys to JSON-like values. Two
//! flavours exist:
//!
//! - [`PlainItem`]: nothing but stored fields.
//! - [`WebSiteItem`]: always carries `destination` and `baseurl`, and exposes
//!   the computed, read-only `url` and `absurl` fields.
//!
//! Equality is structural over the full visible key set (stored + computed),
//! so a plain item holding the same keys as a web site item compares equal.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

/// Key/value storage shared by every item flavour.
pub type Fields = serde_json::Map<String, Value>;

/// Characters left untouched when encoding a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const DESTINATION: &str = "destination";
const BASEURL: &str = "baseurl";
const COMPUTED: [&str; 2] = ["url", "absurl"];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    #[error("'{0}' is a computed field and cannot be assigned")]
    ReadOnly(String),

    #[error("web site item is missing required fields: {}", quoted(.0))]
    MissingFields(Vec<String>),

    #[error("'{0}' is required and cannot be removed")]
    Required(String),

    #[error("'{field}' must be a string, got {value}")]
    InvalidField { field: String, value: Value },
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Plain items
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PlainItem {
    fields: Fields,
}

impl PlainItem {
    pub fn new(fields: Fields) -> Self {
        Self { fields }
    }
}

// =============================================================================
// Web site items
// =============================================================================

/// An item destined for a web site.
///
/// `destination` is the output path relative to the site root and `baseurl`
/// the public root of the site. Both are required for the item's whole
/// lifetime: construction fails if either is absent, and neither can be
/// removed afterwards.
#[derive(Debug, Clone)]
pub struct WebSiteItem {
    destination: String,
    baseurl: String,
    fields: Fields,
}

impl WebSiteItem {
    /// Build a web site item, reporting every missing required field at once.
    pub fn new(mut fields: Fields) -> Result<Self, ItemError> {
        let missing: Vec<String> = [DESTINATION, BASEURL]
            .into_iter()
            .filter(|key| !fields.contains_key(*key))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ItemError::MissingFields(missing));
        }

        if let Some(computed) = COMPUTED.iter().find(|key| fields.contains_key(**key)) {
            return Err(ItemError::ReadOnly(computed.to_string()));
        }

        let destination = expect_string(DESTINATION, fields.shift_remove(DESTINATION))?;
        let baseurl = expect_string(BASEURL, fields.shift_remove(BASEURL))?;

        Ok(Self {
            destination,
            baseurl,
            fields,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn baseurl(&self) -> &str {
        &self.baseurl
    }

    /// The site-relative URL of this item.
    ///
    /// Every path segment is percent-encoded. A trailing `index.html` or
    /// `index.htm` collapses to a bare trailing slash.
    ///
    /// ```ignore
    /// "about/index.html" => "/about/"
    /// "index.html"       => "/"
    /// "a b/c?.html"      => "/a%20b/c%3F.html"
    /// ```
    pub fn url(&self) -> String {
        let mut segments: Vec<&str> = self
            .destination
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let is_index = matches!(segments.last(), Some(&"index.html") | Some(&"index.htm"));
        if is_index {
            segments.pop();
        }

        let encoded = segments
            .iter()
            .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        let mut url = format!("/{encoded}");
        if is_index && !encoded.is_empty() {
            url.push('/');
        }
        url
    }

    /// The absolute URL: `baseurl` joined with [`url`](Self::url) without a
    /// doubled slash.
    pub fn absurl(&self) -> String {
        format!("{}{}", self.baseurl.trim_end_matches('/'), self.url())
    }

    fn computed(&self, key: &str) -> Option<Value> {
        match key {
            DESTINATION => Some(Value::String(self.destination.clone())),
            BASEURL => Some(Value::String(self.baseurl.clone())),
            "url" => Some(Value::String(self.url())),
            "absurl" => Some(Value::String(self.absurl())),
            _ => None,
        }
    }
}

fn expect_string(field: &str, value: Option<Value>) -> Result<String, ItemError> {
    match value {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ItemError::InvalidField {
            field: field.to_string(),
            value: other,
        }),
        None => Err(ItemError::MissingFields(vec![field.to_string()])),
    }
}

// =============================================================================
// Item
// =============================================================================

/// A unit of content flowing through the pipeline.
#[derive(Debug, Clone)]
pub enum Item {
    Plain(PlainItem),
    WebSite(WebSiteItem),
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

impl Item {
    /// An empty plain item.
    pub fn new() -> Self {
        Item::Plain(PlainItem::default())
    }

    /// Build a plain item from at most one mapping plus overrides.
    ///
    /// Keys in `overrides` win over the same keys in `mapping`.
    pub fn from_parts(mapping: Option<Fields>, overrides: Fields) -> Self {
        let mut fields = mapping.unwrap_or_default();
        fields.extend(overrides);
        Item::Plain(PlainItem::new(fields))
    }

    pub fn from_map(fields: Fields) -> Self {
        Item::Plain(PlainItem::new(fields))
    }

    pub fn website(fields: Fields) -> Result<Self, ItemError> {
        WebSiteItem::new(fields).map(Item::WebSite)
    }

    /// Builder-style setter for constructing items in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self, ItemError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Read a key, failing if it is neither stored nor computed.
    pub fn get(&self, key: &str) -> Result<Value, ItemError> {
        self.lookup(key)
            .ok_or_else(|| ItemError::KeyNotFound(key.to_string()))
    }

    /// Read a key, returning `None` if it is absent.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self {
            Item::Plain(item) => item.fields.get(key).cloned(),
            Item::WebSite(item) => item
                .computed(key)
                .or_else(|| item.fields.get(key).cloned()),
        }
    }

    /// Borrow a stored string field.
    ///
    /// Only stored fields (including a web site item's `destination` and
    /// `baseurl`) can be borrowed. The computed `url` and `absurl` give
    /// `None` here; read them with [`get`](Self::get) or
    /// [`lookup`](Self::lookup).
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self {
            Item::WebSite(item) if key == DESTINATION => Some(&item.destination),
            Item::WebSite(item) if key == BASEURL => Some(&item.baseurl),
            _ => self.fields().get(key).and_then(Value::as_str),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        match self {
            Item::Plain(item) => item.fields.contains_key(key),
            Item::WebSite(item) => item.computed(key).is_some() || item.fields.contains_key(key),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ItemError> {
        let key = key.into();
        let value = value.into();
        match self {
            Item::Plain(item) => {
                item.fields.insert(key, value);
            }
            Item::WebSite(item) => match key.as_str() {
                DESTINATION => item.destination = expect_string(DESTINATION, Some(value))?,
                BASEURL => item.baseurl = expect_string(BASEURL, Some(value))?,
                k if COMPUTED.contains(&k) => return Err(ItemError::ReadOnly(key)),
                _ => {
                    item.fields.insert(key, value);
                }
            },
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, ItemError> {
        match self {
            Item::Plain(item) => Ok(item.fields.shift_remove(key)),
            Item::WebSite(item) => match key {
                DESTINATION | BASEURL => Err(ItemError::Required(key.to_string())),
                k if COMPUTED.contains(&k) => Err(ItemError::ReadOnly(key.to_string())),
                _ => Ok(item.fields.shift_remove(key)),
            },
        }
    }

    /// Every visible key, stored and computed.
    pub fn keys(&self) -> Vec<String> {
        self.as_mapping().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        match self {
            Item::Plain(item) => item.fields.len(),
            Item::WebSite(item) => item.fields.len() + 2 + COMPUTED.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the full visible key/value set.
    pub fn as_mapping(&self) -> Fields {
        match self {
            Item::Plain(item) => item.fields.clone(),
            Item::WebSite(item) => {
                let mut mapping = Fields::new();
                mapping.insert(DESTINATION.into(), Value::String(item.destination.clone()));
                mapping.insert(BASEURL.into(), Value::String(item.baseurl.clone()));
                mapping.extend(item.fields.clone());
                mapping.insert("url".into(), Value::String(item.url()));
                mapping.insert("absurl".into(), Value::String(item.absurl()));
                mapping
            }
        }
    }

    fn fields(&self) -> &Fields {
        match self {
            Item::Plain(item) => &item.fields,
            Item::WebSite(item) => &item.fields,
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.as_mapping() == other.as_mapping()
    }
}

impl From<Fields> for Item {
    fn from(fields: Fields) -> Self {
        Item::from_map(fields)
    }
}
