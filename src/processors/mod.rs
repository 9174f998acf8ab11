//! Built-in processors.
//!
//! Composition processors (`pipe`, `when`, `import-processors`) let pipes
//! nest, branch and extend themselves. Content processors read, transform
//! and write site files:
//!
//! - `source`: read files under a directory into web site items
//! - `frontmatter`: lift a leading YAML block into item fields
//! - `markdown`: render markdown content to HTML
//! - `metadata`: set fields on every item
//! - `save`: write item content below an output directory

pub mod frontmatter;
pub mod import;
pub mod markdown;
pub mod metadata;
pub mod pipe;
pub mod save;
pub mod source;
pub mod when;

use std::rc::Rc;

use crate::pipeline::{Application, Module, PipelineError, Processor};

/// Name of the module catalog holding the content processors.
pub const MODULE: &str = "folio";

/// Register every built-in processor, the `when` wrapper and the `folio`
/// module catalog on `app`.
pub fn register_builtins(app: &Application) -> Result<(), PipelineError> {
    let pipe: Rc<dyn Processor> = Rc::new(pipe::processor());
    app.add_shared_processor("pipe", Rc::clone(&pipe));
    app.add_shared_processor("pipeline", pipe);
    app.add_processor("import-processors", import::processor());
    app.add_processor_wrapper("when", when::processor())?;

    let catalog = catalog();
    for name in ["source", "frontmatter", "markdown", "metadata", "save"] {
        if let Some(processor) = catalog.get(name) {
            app.add_shared_processor(name, processor);
        }
    }
    app.add_module(MODULE, catalog);

    Ok(())
}

fn catalog() -> Module {
    Module::new()
        .with("source", source::processor())
        .with("frontmatter", frontmatter::processor())
        .with("markdown", markdown::processor())
        .with("metadata", metadata::processor())
        .with("save", save::processor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{capture_logs, collect, field};
    use serde_json::json;

    fn app() -> Application {
        let app = Application::default();
        register_builtins(&app).unwrap();
        app
    }

    #[test]
    fn test_registers_builtins_without_overrides() {
        let logs = capture_logs(|| {
            app();
        });
        assert!(logs.is_empty(), "{logs:?}");

        let names = app().processor_names();
        for name in [
            "frontmatter",
            "import-processors",
            "markdown",
            "metadata",
            "pipe",
            "pipeline",
            "save",
            "source",
            "when",
        ] {
            assert!(names.iter().any(|n| n == name), "missing {name}");
        }
    }

    #[test]
    fn test_markdown_site_end_to_end() {
        let site = tempfile::tempdir().unwrap();
        let content = site.path().join("content");
        let output = site.path().join("_site");
        std::fs::create_dir_all(content.join("docs")).unwrap();
        std::fs::write(content.join("a.md"), "# Title\n\nSome *text*.\n").unwrap();
        std::fs::write(
            content.join("docs").join("b.md"),
            "---\ntitle: From front matter\n---\n# Ignored\n\nBody\n",
        )
        .unwrap();
        std::fs::write(content.join("style.css"), "body {}").unwrap();

        let app = app();
        app.add_pipe(
            "compile",
            vec![
                json!({"name": "source", "path": content.to_string_lossy()}),
                json!({"name": "frontmatter", "when": [r#"item.source is match(".*\.md$")"#]}),
                json!({"name": "markdown"}),
                json!({"name": "save", "to": output.to_string_lossy()}),
            ],
        );
        let out = collect(app.invoke("compile", None).unwrap());

        assert_eq!(
            field(&out, "destination"),
            vec![json!("a.html"), json!("docs/b.html"), json!("style.css")]
        );
        assert_eq!(
            field(&out, "title"),
            vec![json!("Title"), json!("From front matter"), serde_json::Value::Null]
        );
        assert_eq!(out[1].get("url").unwrap(), json!("/docs/b.html"));

        assert_eq!(
            std::fs::read_to_string(output.join("a.html")).unwrap(),
            "<p>Some <em>text</em>.</p>\n"
        );
        assert_eq!(
            std::fs::read_to_string(output.join("docs/b.html")).unwrap(),
            "<p>Body</p>\n"
        );
        assert_eq!(
            std::fs::read_to_string(output.join("style.css")).unwrap(),
            "body {}"
        );
    }

    #[test]
    fn test_import_from_builtin_catalog() {
        let app = app();
        let pipe = vec![
            json!({"name": "import-processors", "imports": ["md = folio:markdown"]}),
            json!({"name": "md"}),
        ];
        let input = crate::testing::items(json!([{"source": "x.md", "content": "*x*"}]));
        let out = collect(app.invoke(&pipe, Some(crate::pipeline::from_items(input))).unwrap());
        assert_eq!(out[0].get("content").unwrap(), json!("<p><em>x</em></p>\n"));
    }
}
