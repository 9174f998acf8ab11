//! Set fields on every item.
//!
//! ```yaml
//! - name: metadata
//!   metadata:
//!     layout: page
//!     permalink: { $ref: "item://#/url" }
//! ```
//!
//! `metadata:` references are resolved once, when the stage is invoked.
//! `item:` references are resolved against each item as it passes.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::item::{Fields, Item};
use crate::pipeline::reference::{Scopes, resolve};
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream, map_items};

#[derive(Deserialize)]
struct MetadataArgs {
    #[serde(default)]
    metadata: Fields,
    #[serde(default = "default_overwrite")]
    overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

pub fn processor() -> impl Processor {
    Parameters::new(&["metadata", "overwrite"])
        .schema("metadata", json!({"type": "object"}))
        .schema("overwrite", json!({"type": "boolean"}))
        .wrap(process)
}

fn process(_: &Application, stream: Stream, args: MetadataArgs) -> Result<Stream, PipelineError> {
    let MetadataArgs {
        metadata,
        overwrite,
    } = args;
    let template = Value::Object(metadata);

    Ok(map_items(stream, move |item| apply(item, &template, overwrite)))
}

fn apply(mut item: Item, template: &Value, overwrite: bool) -> Result<Item, PipelineError> {
    let mapping = Value::Object(item.as_mapping());
    let scopes = Scopes::new().with("item:", &mapping);

    let Value::Object(values) = resolve(template, &scopes, false)? else {
        return Ok(item);
    };
    for (key, value) in values {
        if overwrite || !item.contains(&key) {
            item.set(key, value)?;
        }
    }
    Ok(item)
}
