//! Nested sub-pipelines.
//!
//! ```yaml
//! - name: pipe
//!   pipe:
//!     - name: frontmatter
//!     - name: markdown
//! ```

use serde::Deserialize;
use serde_json::{Value, json};

use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream};

#[derive(Deserialize)]
struct PipeArgs {
    #[serde(default)]
    pipe: Vec<Value>,
}

/// Run the stream through the stages given in `pipe`. An empty pipe passes
/// the stream through unchanged.
pub fn processor() -> impl Processor {
    Parameters::new(&["pipe"])
        .schema("pipe", json!({"type": "array", "items": {"type": "object"}}))
        .wrap(process)
}

fn process(app: &Application, stream: Stream, args: PipeArgs) -> Result<Stream, PipelineError> {
    app.invoke(&args.pipe, Some(stream))
}
