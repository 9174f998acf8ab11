//! Parameter binding and validation for processors.
//!
//! [`Parameters`] declares the options a processor accepts, where to fall
//! back to when an option is not supplied, and a JSON Schema each option must
//! satisfy. [`Parameters::wrap`] turns a body taking a typed args struct into
//! a [`Processor`]:
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct SaveArgs {
//!     #[serde(default = "default_to")]
//!     to: PathBuf,
//! }
//!
//! let save = Parameters::new(&["to"])
//!     .fallback("to", "metadata://#/save_to")
//!     .schema("to", json!({"type": "string"}))
//!     .wrap(|app, stream, args: SaveArgs| { ... });
//! ```
//!
//! Binding and validation happen when the stage is invoked, before the body
//! runs and before any item flows.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::reference::{Scopes, resolve_reference};
use super::{Application, Options, PipelineError, Processor, Stream};

/// Declared options of a processor.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    names: Vec<&'static str>,
    fallbacks: HashMap<&'static str, String>,
    schemas: HashMap<&'static str, Value>,
}

impl Parameters {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            names: names.to_vec(),
            ..Self::default()
        }
    }

    /// Reference consulted when `name` is not supplied,
    /// e.g. `metadata://#/encoding`.
    pub fn fallback(mut self, name: &'static str, reference: impl Into<String>) -> Self {
        self.fallbacks.insert(name, reference.into());
        self
    }

    /// JSON Schema the value of `name` must satisfy when present.
    pub fn schema(mut self, name: &'static str, schema: Value) -> Self {
        self.schemas.insert(name, schema);
        self
    }

    /// Bind supplied options against the declaration.
    ///
    /// Unknown options are rejected. Missing options take their fallback
    /// value if it resolves, and stay unset otherwise. Every present option
    /// with a schema is validated; a failure reads
    /// `<param>: <value> <reason>`.
    pub fn bind(&self, app: &Application, mut options: Options) -> Result<Options, PipelineError> {
        if let Some(unexpected) = options
            .keys()
            .find(|key| !self.names.contains(&key.as_str()))
        {
            return Err(PipelineError::InvalidParameter(format!(
                "unexpected parameter '{unexpected}'"
            )));
        }

        if self.names.iter().any(|name| {
            !options.contains_key(*name) && self.fallbacks.contains_key(name)
        }) {
            let metadata = app.metadata().to_value();
            let scopes = Scopes::new().with("metadata:", &metadata);
            for name in &self.names {
                if options.contains_key(*name) {
                    continue;
                }
                let Some(reference) = self.fallbacks.get(name) else {
                    continue;
                };
                match resolve_reference(reference, &scopes) {
                    Ok(value) => {
                        options.insert(name.to_string(), value);
                    }
                    Err(e) => tracing::trace!(parameter = name, "no fallback value: {}", e),
                }
            }
        }

        for name in &self.names {
            if let (Some(schema), Some(value)) = (self.schemas.get(name), options.get(*name)) {
                validate(name, value, schema)?;
            }
        }

        Ok(options)
    }

    /// Bind, then deserialize the options into `A`.
    pub fn bind_as<A: DeserializeOwned>(
        &self,
        app: &Application,
        options: Options,
    ) -> Result<A, PipelineError> {
        let options = self.bind(app, options)?;
        serde_json::from_value(Value::Object(options))
            .map_err(|e| PipelineError::InvalidParameter(e.to_string()))
    }

    /// Wrap a processor body that takes typed arguments.
    pub fn wrap<A, F>(self, body: F) -> Bound<A, F>
    where
        A: DeserializeOwned,
        F: Fn(&Application, Stream, A) -> Result<Stream, PipelineError>,
    {
        Bound {
            parameters: self,
            body,
            args: PhantomData,
        }
    }
}

fn validate(name: &str, value: &Value, schema: &Value) -> Result<(), PipelineError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        PipelineError::InvalidParameter(format!("{name}: invalid schema: {e}"))
    })?;

    match validator.iter_errors(value).next() {
        Some(error) => Err(PipelineError::InvalidParameter(format!("{name}: {error}"))),
        None => Ok(()),
    }
}

/// A processor body bound to its parameter declaration.
pub struct Bound<A, F> {
    parameters: Parameters,
    body: F,
    args: PhantomData<fn() -> A>,
}

impl<A, F> Processor for Bound<A, F>
where
    A: DeserializeOwned,
    F: Fn(&Application, Stream, A) -> Result<Stream, PipelineError>,
{
    fn process(
        &self,
        app: &Application,
        stream: Stream,
        options: Options,
    ) -> Result<Stream, PipelineError> {
        let args = self.parameters.bind_as(app, options)?;
        (self.body)(app, stream, args)
    }
}
