//! Pipeline error types.

use crate::item::ItemError;
use crate::pipeline::condition::ConditionError;
use crate::pipeline::reference::ReferenceError;

/// Errors that can occur while building or pulling a pipeline.
///
/// The messages of the lookup and validation variants are matched on by
/// callers, so treat their text as stable.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no such pipe: '{0}'")]
    NoSuchPipe(String),

    #[error("no such processor: '{0}'")]
    NoSuchProcessor(String),

    #[error("illegal wrapper name: {0}")]
    IllegalWrapperName(String),

    /// A processor option failed binding or schema validation.
    #[error("{0}")]
    InvalidParameter(String),

    #[error("stage must be a mapping with a 'name' key, got: {0}")]
    MalformedStage(serde_json::Value),

    #[error("malformed import: '{0}'")]
    MalformedImport(String),

    #[error("no such module: '{0}'")]
    NoSuchModule(String),

    #[error("module '{module}' has no processor '{callable}'")]
    NoSuchCallable { module: String, callable: String },

    #[error("item error: {0}")]
    Item(#[from] ItemError),

    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("processor '{processor}' failed: {message}")]
    Processor { processor: String, message: String },
}

impl PipelineError {
    /// Create a processor-specific error.
    pub fn processor(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processor {
            processor: processor.into(),
            message: message.into(),
        }
    }
}
