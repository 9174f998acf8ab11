//! Conditional processing.
//!
//! `when` is registered as a processor wrapper, so any stage can carry a
//! `when` option:
//!
//! ```yaml
//! - name: markdown
//!   when:
//!     - item.source is match(".*\.md$")
//! ```
//!
//! Items satisfying every condition go through the wrapped processor; all
//! other items bypass it untouched. Bypassed items are held back while the
//! processor pulls, and each processor output is emitted right after the
//! bypassed items that preceded it upstream. The relative order of bypassed
//! items never changes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::item::Item;
use crate::pipeline::condition::Conditions;
use crate::pipeline::{Application, Parameters, PipelineError, Processor, Stream};

#[derive(Deserialize)]
struct WhenArgs {
    processor: Value,
    #[serde(default)]
    when: Vec<String>,
}

pub fn processor() -> impl Processor {
    Parameters::new(&["processor", "when"])
        .schema("processor", json!({"type": "object", "required": ["name"]}))
        .schema("when", json!({"type": "array", "items": {"type": "string"}}))
        .wrap(process)
}

fn process(app: &Application, stream: Stream, args: WhenArgs) -> Result<Stream, PipelineError> {
    let conditions = Conditions::compile(&args.when)?;

    let bypassed = Rc::new(RefCell::new(VecDeque::new()));
    let matched = Matched {
        upstream: stream,
        conditions,
        bypassed: Rc::clone(&bypassed),
    };

    let processed = app.invoke(std::slice::from_ref(&args.processor), Some(Box::new(matched)))?;

    Ok(Box::new(Splice {
        processed,
        bypassed,
        ready: None,
        exhausted: false,
    }))
}

/// The matched sub-stream fed to the wrapped processor. Items failing a
/// condition are parked in `bypassed`.
struct Matched {
    upstream: Stream,
    conditions: Conditions,
    bypassed: Rc<RefCell<VecDeque<Item>>>,
}

impl Iterator for Matched {
    type Item = Result<Item, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = match self.upstream.next()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            match self.conditions.evaluate(&item) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => self.bypassed.borrow_mut().push_back(item),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Interleaves processor output with the bypassed items.
struct Splice {
    processed: Stream,
    bypassed: Rc<RefCell<VecDeque<Item>>>,
    ready: Option<Result<Item, PipelineError>>,
    exhausted: bool,
}

impl Iterator for Splice {
    type Item = Result<Item, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.bypassed.borrow_mut().pop_front() {
                return Some(Ok(item));
            }
            if let Some(output) = self.ready.take() {
                return Some(output);
            }
            if self.exhausted {
                return None;
            }
            // Pulling may park more bypassed items, which go out first.
            match self.processed.next() {
                Some(output) => self.ready = Some(output),
                None => self.exhausted = true,
            }
        }
    }
}
