//! Markdown rendering.

use std::collections::HashSet;

use pulldown_cmark::{CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use serde::Deserialize;
use serde_json::json;

use crate::item::Item;
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream, map_items};

const MARKDOWN_SUFFIXES: [&str; 2] = [".md", ".markdown"];

#[derive(Deserialize)]
struct MarkdownArgs {
    #[serde(default)]
    extensions: Vec<String>,
}

pub fn processor() -> impl Processor {
    Parameters::new(&["extensions"])
        .schema(
            "extensions",
            json!({"type": "array", "items": {"type": "string"}}),
        )
        .wrap(process)
}

/// Converts the `content` of markdown items to HTML.
///
/// An item is markdown when its `source` (or, lacking one, its
/// `destination`) ends in `.md` or `.markdown`. Other items pass through
/// untouched. A leading level-one heading becomes the item's `title` unless
/// it already has one, and is dropped from the body.
fn process(_: &Application, stream: Stream, args: MarkdownArgs) -> Result<Stream, PipelineError> {
    let options = parser_options(&args.extensions)?;
    Ok(map_items(stream, move |item| convert(item, options)))
}

fn parser_options(extensions: &[String]) -> Result<Options, PipelineError> {
    let mut options = Options::empty();
    for extension in extensions {
        match extension.as_str() {
            "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
            "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
            "gfm" => options.insert(Options::ENABLE_GFM),
            "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
            "smart_punctuation" => options.insert(Options::ENABLE_SMART_PUNCTUATION),
            "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
            "tables" => options.insert(Options::ENABLE_TABLES),
            "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
            other => {
                return Err(PipelineError::InvalidParameter(format!(
                    "extensions: unknown markdown extension '{other}'"
                )));
            }
        }
    }
    Ok(options)
}

fn convert(mut item: Item, options: Options) -> Result<Item, PipelineError> {
    let markdown_path = item
        .get_str("source")
        .or_else(|| item.get_str("destination"))
        .is_some_and(is_markdown);
    if !markdown_path {
        return Ok(item);
    }
    let Some(content) = item.get_str("content") else {
        return Ok(item);
    };

    let rendered = render_markdown(content, options);
    item.set("content", rendered.html)?;
    if let Some(title) = rendered.title
        && !item.contains("title")
    {
        item.set("title", title)?;
    }

    let html_destination = item
        .get_str("destination")
        .and_then(strip_markdown_suffix)
        .map(|stem| format!("{stem}.html"));
    if let Some(destination) = html_destination {
        item.set("destination", destination)?;
    }

    Ok(item)
}

fn is_markdown(path: &str) -> bool {
    strip_markdown_suffix(path).is_some()
}

fn strip_markdown_suffix(path: &str) -> Option<&str> {
    MARKDOWN_SUFFIXES.iter().find_map(|suffix| {
        let split = path.len().checked_sub(suffix.len())?;
        let (stem, tail) = (path.get(..split)?, path.get(split..)?);
        tail.eq_ignore_ascii_case(suffix).then_some(stem)
    })
}

struct Rendered {
    html: String,
    title: Option<String>,
}

/// Render markdown to HTML, giving every heading a unique `id`.
fn render_markdown(markdown: &str, options: Options) -> Rendered {
    let mut events: Vec<Event> = Parser::new_ext(markdown, options).collect();

    let mut title = None;
    if let Some(Event::Start(Tag::Heading {
        level: HeadingLevel::H1,
        ..
    })) = events.first()
        && let Some(end) = events
            .iter()
            .position(|event| matches!(event, Event::End(TagEnd::Heading(_))))
    {
        title = Some(heading_text(&events[1..end]));
        events.drain(..=end);
    }

    // Explicit ids (`# Title {#id}`) are kept and never reused.
    let mut used_heading_ids: HashSet<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    for index in 0..events.len() {
        if !matches!(events[index], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }
        let base_id = slugify(&heading_text(&events[index + 1..]));
        let mut id = base_id.clone();
        let mut suffix = 1;
        while id.is_empty() || used_heading_ids.contains(&id) {
            id = format!("{}-{}", base_id, suffix);
            suffix += 1;
        }
        used_heading_ids.insert(id.clone());

        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[index] {
            *slot = Some(CowStr::from(id));
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());

    Rendered {
        html: html_output,
        title,
    }
}

/// Text of the heading whose events start at `events[0]`.
fn heading_text(events: &[Event]) -> String {
    events
        .iter()
        .take_while(|event| !matches!(event, Event::End(TagEnd::Heading(_))))
        .filter_map(|event| match event {
            Event::Text(text) | Event::Code(text) => Some(&**text),
            _ => None,
        })
        .collect()
}

/// Convert a string to a slug suitable for use as an HTML id.
fn slugify(s: &str) -> String {
    s.to_lowercase()
        .replace(' ', "-")
        .replace(|c: char| !c.is_alphanumeric() && c != '-', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::from_items;
    use crate::testing::{collect, items};
    use serde_json::Value;

    fn run(input: Value, extensions: &[&str]) -> Vec<Item> {
        let app = Application::default();
        app.add_processor("markdown", processor());
        let pipe = vec![json!({"name": "markdown", "extensions": extensions})];
        collect(app.invoke(&pipe, Some(from_items(items(input)))).unwrap())
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("What's New?"), "whats-new");
        assert_eq!(slugify("API Reference"), "api-reference");
    }

    #[test]
    fn test_strip_markdown_suffix() {
        assert_eq!(strip_markdown_suffix("docs/a.md"), Some("docs/a"));
        assert_eq!(strip_markdown_suffix("A.MARKDOWN"), Some("A"));
        assert_eq!(strip_markdown_suffix("a.html"), None);
        assert_eq!(strip_markdown_suffix("md"), None);
    }

    #[test]
    fn test_leading_heading_becomes_title() {
        let rendered = render_markdown("# Hello\n\nWorld", Options::empty());
        assert_eq!(rendered.title.as_deref(), Some("Hello"));
        assert_eq!(rendered.html, "<p>World</p>\n");
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let rendered = render_markdown("Intro\n\n## Setup\n\n## Setup\n", Options::empty());
        assert!(rendered.title.is_none());
        assert!(rendered.html.contains("<h2 id=\"setup\">Setup</h2>"));
        assert!(rendered.html.contains("<h2 id=\"setup-1\">Setup</h2>"));
    }

    #[test]
    fn test_converts_markdown_items() {
        let out = run(
            json!([{"source": "a.md", "destination": "a.md", "content": "# Title\n\n*hi*"}]),
            &[],
        );
        assert_eq!(out[0].get("title").unwrap(), json!("Title"));
        assert_eq!(out[0].get("content").unwrap(), json!("<p><em>hi</em></p>\n"));
        assert_eq!(out[0].get("destination").unwrap(), json!("a.html"));
    }

    #[test]
    fn test_existing_title_wins() {
        let out = run(
            json!([{"source": "a.md", "title": "Given", "content": "# Heading\n"}]),
            &[],
        );
        assert_eq!(out[0].get("title").unwrap(), json!("Given"));
        assert_eq!(out[0].get("content").unwrap(), json!(""));
    }

    #[test]
    fn test_other_items_pass_through() {
        let input = json!([
            {"source": "style.css", "destination": "style.css", "content": "# not markdown"},
            {"content": "# no path"},
        ]);
        assert_eq!(run(input.clone(), &[]), items(input));
    }

    #[test]
    fn test_extensions() {
        let input = json!([{"source": "t.md", "content": "| a |\n|---|\n| 1 |\n"}]);
        let plain = run(input.clone(), &[]);
        assert!(!plain[0].get_str("content").unwrap().contains("<table>"));

        let tables = run(input, &["tables"]);
        assert!(tables[0].get_str("content").unwrap().contains("<table>"));
    }

    #[test]
    fn test_unknown_extension_fails_before_items_flow() {
        let app = Application::default();
        app.add_processor("markdown", processor());
        let pipe = vec![json!({"name": "markdown", "extensions": ["nope"]})];
        let err = app.invoke(&pipe, None).err().unwrap();
        assert_eq!(
            err.to_string(),
            "extensions: unknown markdown extension 'nope'"
        );
    }
}
