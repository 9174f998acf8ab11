//! Write item content to the output directory.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::json;

use crate::item::{Item, ItemError};
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream, map_items};

const NAME: &str = "save";

#[derive(Deserialize)]
struct SaveArgs {
    #[serde(default = "default_to")]
    to: PathBuf,
}

fn default_to() -> PathBuf {
    PathBuf::from("_site")
}

pub fn processor() -> impl Processor {
    Parameters::new(&["to"])
        .fallback("to", "metadata://#/save_to")
        .schema("to", json!({"type": "string", "minLength": 1}))
        .wrap(process)
}

/// Each item's `content` is written to `<to>/<destination>` as it is pulled,
/// creating parent directories as needed. Items pass through unchanged.
fn process(_: &Application, stream: Stream, args: SaveArgs) -> Result<Stream, PipelineError> {
    let output_dir = args.to;
    Ok(map_items(stream, move |item| {
        write(&item, &output_dir)?;
        Ok(item)
    }))
}

fn write(item: &Item, output_dir: &Path) -> Result<(), PipelineError> {
    let destination = item
        .get_str("destination")
        .ok_or_else(|| ItemError::KeyNotFound("destination".into()))?;
    let content = item.get_str("content").ok_or_else(|| {
        PipelineError::processor(NAME, format!("'{destination}' has no text content"))
    })?;

    let output_path = output_path(output_dir, destination)?;
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, content)?;

    tracing::debug!(path = %output_path.display(), "saved");
    Ok(())
}

/// Destinations are relative to the output directory and may not escape it.
fn output_path(output_dir: &Path, destination: &str) -> Result<PathBuf, PipelineError> {
    let relative = Path::new(destination.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(PipelineError::processor(
            NAME,
            format!("destination '{destination}' is outside the output directory"),
        ));
    }
    Ok(output_dir.join(relative))
}
