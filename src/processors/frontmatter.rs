//! Front matter extraction.
//!
//! A document may start with a YAML block between two delimiter lines:
//!
//! ```markdown
//! ---
//! title: Getting Started
//! tags: [intro]
//! ---
//!
//! # Content starts here
//! ```
//!
//! The block is removed from `content` and its keys are set on the item.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::item::{Fields, Item};
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream, map_items};

const NAME: &str = "frontmatter";

#[derive(Deserialize)]
struct FrontmatterArgs {
    #[serde(default = "default_delimiter")]
    delimiter: String,
    #[serde(default = "default_overwrite")]
    overwrite: bool,
}

fn default_delimiter() -> String {
    "---".to_string()
}

fn default_overwrite() -> bool {
    true
}

pub fn processor() -> impl Processor {
    Parameters::new(&["delimiter", "overwrite"])
        .schema("delimiter", json!({"type": "string", "minLength": 1}))
        .schema("overwrite", json!({"type": "boolean"}))
        .wrap(process)
}

fn process(_: &Application, stream: Stream, args: FrontmatterArgs) -> Result<Stream, PipelineError> {
    Ok(map_items(stream, move |item| {
        extract(item, &args.delimiter, args.overwrite)
    }))
}

fn extract(mut item: Item, delimiter: &str, overwrite: bool) -> Result<Item, PipelineError> {
    let Some(parsed) = item
        .get_str("content")
        .and_then(|content| split_front_matter(content, delimiter))
    else {
        return Ok(item);
    };

    let front_matter = parse_yaml(parsed.front_matter).map_err(|e| {
        let source = item.get_str("source").unwrap_or("<item>");
        PipelineError::processor(NAME, format!("invalid front matter in {source}: {e}"))
    })?;
    let content = parsed.content.to_string();

    item.set("content", content)?;
    for (key, value) in front_matter {
        if overwrite || !item.contains(&key) {
            item.set(key, value)?;
        }
    }
    Ok(item)
}

/// A document split into its front matter block and the remaining content.
#[derive(Debug, PartialEq)]
struct ParsedContent<'a> {
    front_matter: &'a str,
    content: &'a str,
}

/// Returns `None` when the content does not open with `delimiter` or the
/// block is never closed.
fn split_front_matter<'a>(content: &'a str, delimiter: &str) -> Option<ParsedContent<'a>> {
    let content = content.trim_start();
    let after_opening = content.strip_prefix(delimiter)?;
    let after_opening = after_opening.strip_prefix('\r').unwrap_or(after_opening);
    let after_opening = after_opening.strip_prefix('\n')?;

    // The closing delimiter may directly follow the opening one.
    let (front_matter, rest) = if let Some(rest) = after_opening.strip_prefix(delimiter) {
        ("", rest)
    } else {
        let closing = format!("\n{delimiter}");
        let closing_pos = after_opening.find(&closing)?;
        (
            &after_opening[..closing_pos],
            &after_opening[closing_pos + closing.len()..],
        )
    };

    // Drop the remainder of the closing line.
    let content = match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim_start_matches(['\r', '\n']),
        None => "",
    };

    Some(ParsedContent {
        front_matter,
        content,
    })
}

fn parse_yaml(yaml: &str) -> Result<Fields, String> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(Value::Null) => Ok(Fields::new()),
        Ok(other) => Err(format!("expected a mapping, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}
