use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::item::Fields;

/// Contents of a site file:
///
/// ```yaml
/// metadata:
///   url: https://example.com
/// pipes:
///   compile:
///     - name: source
///       path: content
///     - name: markdown
///     - name: save
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Base layer of the application metadata.
    #[serde(default)]
    pub metadata: Fields,

    /// Named pipes, each an ordered list of stage descriptors.
    #[serde(default)]
    pub pipes: BTreeMap<String, Vec<Value>>,
}
