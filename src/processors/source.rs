//! Read files from disk into web site items.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::item::{Fields, Item};
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream};

const NAME: &str = "source";

#[derive(Deserialize)]
struct SourceArgs {
    #[serde(default = "default_path")]
    path: PathBuf,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    baseurl: String,
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

pub fn processor() -> impl Processor {
    Parameters::new(&["path", "pattern", "baseurl"])
        .fallback("baseurl", "metadata://#/url")
        .schema("path", json!({"type": "string"}))
        .schema("pattern", json!({"type": "string"}))
        .schema("baseurl", json!({"type": "string"}))
        .wrap(process)
}

/// Upstream items pass through first. Then every file under `path` becomes
/// a web site item, in sorted order, with `source` and `destination` set to
/// its `/`-separated relative path.
fn process(_: &Application, stream: Stream, args: SourceArgs) -> Result<Stream, PipelineError> {
    let pattern = args
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| PipelineError::InvalidParameter(format!("pattern: {e}")))?;

    let files = Files {
        root: args.path,
        pattern,
        baseurl: args.baseurl,
        pending: None,
    };
    Ok(Box::new(stream.chain(files)))
}

/// Lazily walks `root` on first pull, then reads one file per item.
struct Files {
    root: PathBuf,
    pattern: Option<Regex>,
    baseurl: String,
    pending: Option<std::vec::IntoIter<(PathBuf, String)>>,
}

impl Files {
    /// Relative paths to read, each paired with its `/`-separated source name.
    fn discover(&self) -> std::io::Result<Vec<(PathBuf, String)>> {
        let mut files = Vec::new();
        walk_directory(&self.root, Path::new(""), &mut files)?;
        Ok(files
            .into_iter()
            .map(|relative| {
                let source = to_source_path(&relative);
                (relative, source)
            })
            .filter(|(_, source)| self.pattern.as_ref().is_none_or(|re| re.is_match(source)))
            .collect())
    }

    fn read(&self, relative: &Path, source: String) -> Result<Item, PipelineError> {
        let path = self.root.join(relative);
        let bytes = std::fs::read(&path)?;
        let content = String::from_utf8(bytes).map_err(|_| {
            PipelineError::processor(NAME, format!("{} is not valid UTF-8", path.display()))
        })?;

        let mut fields = Fields::new();
        fields.insert("source".into(), Value::String(source.clone()));
        fields.insert("content".into(), Value::String(content));
        fields.insert("destination".into(), Value::String(source));
        fields.insert("baseurl".into(), Value::String(self.baseurl.clone()));
        Ok(Item::website(fields)?)
    }
}

impl Iterator for Files {
    type Item = Result<Item, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            match self.discover() {
                Ok(files) => {
                    tracing::debug!(root = %self.root.display(), "found {} files", files.len());
                    self.pending = Some(files.into_iter());
                }
                Err(e) => {
                    self.pending = Some(Vec::new().into_iter());
                    return Some(Err(PipelineError::processor(
                        NAME,
                        format!("cannot read {}: {}", self.root.display(), e),
                    )));
                }
            }
        }

        let (relative, source) = self.pending.as_mut()?.next()?;
        Some(self.read(&relative, source))
    }
}

/// Recursively collect file paths relative to `dir`, sorted by name.
/// Hidden entries are skipped.
fn walk_directory(dir: &Path, relative_path: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let item_relative_path = relative_path.join(&file_name);
        if path.is_dir() {
            walk_directory(&path, &item_relative_path, files)?;
        } else if path.is_file() {
            files.push(item_relative_path);
        }
    }

    Ok(())
}

fn to_source_path(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::from_items;
    use crate::testing::{collect, field};

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("index.md"), "# Home").unwrap();
        std::fs::write(dir.path().join("docs").join("guide.md"), "guide").unwrap();
        std::fs::write(dir.path().join("style.css"), "body {}").unwrap();
        std::fs::write(dir.path().join(".hidden"), "secret").unwrap();
        dir
    }

    fn app() -> Application {
        let app = Application::default();
        app.add_processor(NAME, processor());
        app
    }

    fn stage(dir: &Path, extra: Value) -> Vec<Value> {
        let mut stage = json!({"name": NAME, "path": dir.to_string_lossy()});
        if let (Value::Object(stage), Value::Object(extra)) = (&mut stage, extra) {
            stage.extend(extra);
        }
        vec![stage]
    }

    #[test]
    fn test_reads_files_sorted() {
        let dir = site();
        let out = collect(app().invoke(&stage(dir.path(), json!({})), None).unwrap());

        assert_eq!(
            field(&out, "source"),
            vec![json!("docs/guide.md"), json!("index.md"), json!("style.css")]
        );
        assert_eq!(out[1].get("content").unwrap(), json!("# Home"));
        assert_eq!(out[1].get("destination").unwrap(), json!("index.md"));
        assert_eq!(out[0].get("url").unwrap(), json!("/docs/guide.md"));
    }

    #[test]
    fn test_pattern_filters_relative_paths() {
        let dir = site();
        let pipe = stage(dir.path(), json!({"pattern": r"\.md$"}));
        let out = collect(app().invoke(&pipe, None).unwrap());
        assert_eq!(
            field(&out, "source"),
            vec![json!("docs/guide.md"), json!("index.md")]
        );
    }

    #[test]
    fn test_baseurl_falls_back_to_metadata_url() {
        let dir = site();
        let app = Application::new(
            json!({"url": "https://example.com/"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        app.add_processor(NAME, processor());
        let out = collect(app.invoke(&stage(dir.path(), json!({})), None).unwrap());
        assert_eq!(
            out[1].get("absurl").unwrap(),
            json!("https://example.com/index.md")
        );
    }

    #[test]
    fn test_upstream_items_come_first() {
        let dir = site();
        let upstream = from_items(vec![Item::new().with("source", "upstream").unwrap()]);
        let pipe = stage(dir.path(), json!({"pattern": "^index"}));
        let out = collect(app().invoke(&pipe, Some(upstream)).unwrap());
        assert_eq!(field(&out, "source"), vec![json!("upstream"), json!("index.md")]);
    }

    #[test]
    fn test_nothing_is_read_until_pulled() {
        let dir = site();
        let pipe = stage(&dir.path().join("missing"), json!({}));
        let mut stream = app().invoke(&pipe, None).unwrap();

        let err = stream.next().unwrap().unwrap_err();
        assert!(err.to_string().starts_with("processor 'source' failed: cannot read"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = site();
        let err = app()
            .invoke(&stage(dir.path(), json!({"pattern": "("})), None)
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("pattern: "));
    }

    #[test]
    fn test_binary_file_is_an_error_item() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("b.txt"), "text").unwrap();

        let mut stream = app().invoke(&stage(dir.path(), json!({})), None).unwrap();
        assert!(stream.next().unwrap().is_err());
        assert_eq!(
            stream.next().unwrap().unwrap().get("source").unwrap(),
            json!("b.txt")
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_file_name_is_still_read() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "latin").unwrap();

        let out = collect(app().invoke(&stage(dir.path(), json!({})), None).unwrap());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("content").unwrap(), json!("latin"));
        assert_eq!(out[0].get("source").unwrap(), json!("caf\u{fffd}.txt"));
    }
}
