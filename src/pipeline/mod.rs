//! Processor pipeline engine.
//!
//! A pipe is an ordered list of stage descriptors:
//!
//! ```yaml
//! - name: source
//!   path: content
//! - name: markdown
//!   when: ['item.source is match(".*\.md$")']
//! - name: save
//!   to: { $ref: "metadata://#/output" }
//! ```
//!
//! [`Application::invoke`] folds a stream of items through the stages. Every
//! processor receives the previous stage's stream and returns a new one, so
//! the whole pipe becomes a chain of nested lazy iterators: nothing is read,
//! converted or written until the caller pulls.
//!
//! Processors are looked up by name in the application's registry. Stage
//! options are reference-resolved against the application metadata before
//! the processor sees them, and option keys naming a registered wrapper
//! (such as `when`) wrap the stage in that wrapper.

pub mod condition;
mod error;
mod metadata;
pub mod parameters;
pub mod reference;

pub use error::PipelineError;
pub use metadata::Metadata;
pub use parameters::Parameters;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::item::{Fields, Item};
use reference::{Scopes, resolve};

/// Options handed to a processor, after reference resolution.
pub type Options = Fields;

/// A lazy stream of items. Errors travel in-band, so a failing item does not
/// invalidate the items pulled before it.
pub type Stream = Box<dyn Iterator<Item = Result<Item, PipelineError>>>;

/// Stage descriptor keys that can never name a wrapper.
pub const RESERVED_STAGE_KEYS: [&str; 2] = ["name", "args"];

/// Turn any collection of items into a [`Stream`].
pub fn from_items<I>(items: I) -> Stream
where
    I: IntoIterator<Item = Item>,
    I::IntoIter: 'static,
{
    Box::new(items.into_iter().map(Ok))
}

/// Apply `f` to every successful item of `stream`, passing errors through.
pub fn map_items<F>(stream: Stream, mut f: F) -> Stream
where
    F: FnMut(Item) -> Result<Item, PipelineError> + 'static,
{
    Box::new(stream.map(move |item| item.and_then(&mut f)))
}

/// The unit of composition: a stream transform.
///
/// Any `Fn(&Application, Stream, Options) -> Result<Stream, PipelineError>`
/// is a processor. Returning `Err` reports a configuration problem before
/// any item flows; per-item failures belong inside the returned stream.
pub trait Processor {
    fn process(
        &self,
        app: &Application,
        stream: Stream,
        options: Options,
    ) -> Result<Stream, PipelineError>;
}

impl<F> Processor for F
where
    F: Fn(&Application, Stream, Options) -> Result<Stream, PipelineError>,
{
    fn process(
        &self,
        app: &Application,
        stream: Stream,
        options: Options,
    ) -> Result<Stream, PipelineError> {
        self(app, stream, options)
    }
}

/// A pipeline to invoke: either a registered pipe name or inline stages.
#[derive(Debug, Clone, Copy)]
pub enum Pipe<'a> {
    Named(&'a str),
    Inline(&'a [Value]),
}

impl<'a> From<&'a str> for Pipe<'a> {
    fn from(name: &'a str) -> Self {
        Pipe::Named(name)
    }
}

impl<'a> From<&'a String> for Pipe<'a> {
    fn from(name: &'a String) -> Self {
        Pipe::Named(name)
    }
}

impl<'a> From<&'a [Value]> for Pipe<'a> {
    fn from(stages: &'a [Value]) -> Self {
        Pipe::Inline(stages)
    }
}

impl<'a> From<&'a Vec<Value>> for Pipe<'a> {
    fn from(stages: &'a Vec<Value>) -> Self {
        Pipe::Inline(stages)
    }
}

/// A named catalog of processors that `import-processors` can pull from.
#[derive(Clone, Default)]
pub struct Module {
    processors: HashMap<String, Rc<dyn Processor>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Processor + 'static>(mut self, name: impl Into<String>, processor: P) -> Self {
        self.processors.insert(name.into(), Rc::new(processor));
        self
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Processor>> {
        self.processors.get(name).cloned()
    }
}

struct State {
    metadata: RefCell<Metadata>,
    processors: RefCell<HashMap<String, Rc<dyn Processor>>>,
    pipes: RefCell<HashMap<String, Vec<Value>>>,
    /// Wrappers in registration order, which is also their nesting order.
    wrappers: RefCell<Vec<(String, Rc<dyn Processor>)>>,
    modules: RefCell<HashMap<String, Module>>,
}

/// The pipeline engine: registries plus the metadata store.
///
/// `Application` is a cheap handle; clones share the same state. Processors
/// may keep a clone inside the streams they return.
#[derive(Clone)]
pub struct Application {
    state: Rc<State>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new(Fields::new())
    }
}

impl Application {
    /// Create an application whose metadata base layer is `metadata`.
    pub fn new(metadata: Fields) -> Self {
        Self {
            state: Rc::new(State {
                metadata: RefCell::new(Metadata::new(metadata)),
                processors: RefCell::new(HashMap::new()),
                pipes: RefCell::new(HashMap::new()),
                wrappers: RefCell::new(Vec::new()),
                modules: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn metadata(&self) -> Ref<'_, Metadata> {
        self.state.metadata.borrow()
    }

    pub fn metadata_mut(&self) -> RefMut<'_, Metadata> {
        self.state.metadata.borrow_mut()
    }

    /// Register a processor. A later registration under the same name wins.
    pub fn add_processor<P: Processor + 'static>(&self, name: impl Into<String>, processor: P) {
        self.add_shared_processor(name, Rc::new(processor));
    }

    pub fn add_shared_processor(&self, name: impl Into<String>, processor: Rc<dyn Processor>) {
        let name = name.into();
        let previous = self
            .state
            .processors
            .borrow_mut()
            .insert(name.clone(), processor);
        if previous.is_some() {
            tracing::warn!("processor override: '{}'", name);
        }
    }

    /// Register a named pipe. A later registration under the same name wins.
    pub fn add_pipe(&self, name: impl Into<String>, stages: Vec<Value>) {
        let name = name.into();
        let previous = self.state.pipes.borrow_mut().insert(name.clone(), stages);
        if previous.is_some() {
            tracing::warn!("pipe override: '{}'", name);
        }
    }

    /// Register a processor wrapper.
    ///
    /// A stage carrying an option named after the wrapper is handed to the
    /// wrapper instead: `{name: X, <wrapper>: v, ..rest}` runs as
    /// `{name: <wrapper>, processor: {name: X, ..rest}, <wrapper>: v}`.
    /// The wrapper is also usable directly as a stage name.
    pub fn add_processor_wrapper<P: Processor + 'static>(
        &self,
        name: impl Into<String>,
        wrapper: P,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        if RESERVED_STAGE_KEYS.contains(&name.as_str()) {
            return Err(PipelineError::IllegalWrapperName(name));
        }

        let mut wrappers = self.state.wrappers.borrow_mut();
        let wrapper: Rc<dyn Processor> = Rc::new(wrapper);
        match wrappers.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => {
                tracing::warn!("processor wrapper override: '{}'", name);
                slot.1 = wrapper;
            }
            None => wrappers.push((name, wrapper)),
        }
        Ok(())
    }

    /// Register a processor catalog for `import-processors`.
    pub fn add_module(&self, name: impl Into<String>, module: Module) {
        let name = name.into();
        if self.state.modules.borrow_mut().insert(name.clone(), module).is_some() {
            tracing::warn!("module override: '{}'", name);
        }
    }

    pub fn module(&self, name: &str) -> Option<Module> {
        self.state.modules.borrow().get(name).cloned()
    }

    /// Look up a processor or wrapper by name.
    pub fn processor(&self, name: &str) -> Option<Rc<dyn Processor>> {
        if let Some(processor) = self.state.processors.borrow().get(name) {
            return Some(Rc::clone(processor));
        }
        self.state
            .wrappers
            .borrow()
            .iter()
            .find(|(wrapper, _)| wrapper == name)
            .map(|(_, processor)| Rc::clone(processor))
    }

    pub fn pipe(&self, name: &str) -> Option<Vec<Value>> {
        self.state.pipes.borrow().get(name).cloned()
    }

    /// Names of the registered pipes, sorted.
    pub fn pipe_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.pipes.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the registered processors and wrappers, sorted.
    pub fn processor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.processors.borrow().keys().cloned().collect();
        names.extend(self.state.wrappers.borrow().iter().map(|(n, _)| n.clone()));
        names.sort();
        names.dedup();
        names
    }

    /// Run `stream` through a pipe.
    ///
    /// Every stage is resolved and called in order, so unknown pipe or
    /// processor names, malformed stages and option validation failures are
    /// reported here, before a single item is requested. The returned stream
    /// is lazy; errors raised by processors while items flow come out of it
    /// at the point the failing item is pulled.
    pub fn invoke<'p>(
        &self,
        pipe: impl Into<Pipe<'p>>,
        stream: Option<Stream>,
    ) -> Result<Stream, PipelineError> {
        let stages = match pipe.into() {
            Pipe::Named(name) => self
                .pipe(name)
                .ok_or_else(|| PipelineError::NoSuchPipe(name.to_string()))?,
            Pipe::Inline(stages) => stages.to_vec(),
        };

        let mut stream = stream.unwrap_or_else(|| Box::new(std::iter::empty()));
        for stage in stages {
            let (name, options) = self.prepare_stage(stage)?;
            let processor = self
                .processor(&name)
                .ok_or_else(|| PipelineError::NoSuchProcessor(name.clone()))?;

            tracing::debug!(processor = %name, "invoking stage");
            stream = processor.process(self, stream, options)?;
        }

        Ok(stream)
    }

    /// Split a stage descriptor into the processor to call and its options.
    fn prepare_stage(&self, stage: Value) -> Result<(String, Options), PipelineError> {
        let Value::Object(mut descriptor) = stage else {
            return Err(PipelineError::MalformedStage(stage));
        };

        let name = match descriptor.shift_remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(PipelineError::MalformedStage(Value::Object(descriptor))),
        };

        if self.processor(&name).is_none() {
            return Err(PipelineError::NoSuchProcessor(name));
        }

        // Options may also be nested under `args`; flat keys win.
        match descriptor.shift_remove("args") {
            None => {}
            Some(Value::Object(args)) => {
                for (key, value) in args {
                    descriptor.entry(key).or_insert(value);
                }
            }
            Some(other) => {
                descriptor.insert("args".into(), other);
                descriptor.insert("name".into(), Value::String(name));
                return Err(PipelineError::MalformedStage(Value::Object(descriptor)));
            }
        }

        let (name, descriptor) = self.apply_wrappers(name, descriptor);

        // A wrapped descriptor is resolved when the wrapper invokes it.
        let wrapped = self.is_wrapper(&name);
        let metadata = self.metadata().to_value();
        let scopes = Scopes::new().with("metadata:", &metadata);
        let mut options = Options::with_capacity(descriptor.len());
        for (key, value) in descriptor {
            let value = if wrapped && key == "processor" {
                value
            } else {
                resolve(&value, &scopes, true)?
            };
            options.insert(key, value);
        }

        Ok((name, options))
    }

    fn is_wrapper(&self, name: &str) -> bool {
        self.state.wrappers.borrow().iter().any(|(wrapper, _)| wrapper == name)
    }

    fn apply_wrappers(&self, mut name: String, mut options: Options) -> (String, Options) {
        let wrappers: Vec<String> = self
            .state
            .wrappers
            .borrow()
            .iter()
            .map(|(wrapper, _)| wrapper.clone())
            .collect();

        for wrapper in wrappers {
            if wrapper == name {
                continue;
            }
            let Some(wrapper_options) = options.shift_remove(&wrapper) else {
                continue;
            };

            let mut inner = Options::with_capacity(options.len() + 1);
            inner.insert("name".into(), Value::String(name));
            inner.extend(options);

            let mut outer = Options::new();
            outer.insert("processor".into(), Value::Object(inner));
            outer.insert(wrapper.clone(), wrapper_options);

            name = wrapper;
            options = outer;
        }

        (name, options)
    }
}
