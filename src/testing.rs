//! Helpers shared by unit tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::item::Item;
use crate::pipeline::Stream;

/// Build plain items from a JSON array of objects.
pub fn items(value: Value) -> Vec<Item> {
    match value {
        Value::Array(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                Value::Object(fields) => Item::from_map(fields),
                other => panic!("expected an object, got {other}"),
            })
            .collect(),
        other => panic!("expected an array, got {other}"),
    }
}

/// Drain a stream, panicking on the first error.
pub fn collect(stream: Stream) -> Vec<Item> {
    stream.map(|item| item.unwrap()).collect()
}

/// Project one key out of every item.
pub fn field(items: &[Item], key: &str) -> Vec<Value> {
    items
        .iter()
        .map(|item| item.lookup(key).unwrap_or(Value::Null))
        .collect()
}

type Captured = Arc<Mutex<Vec<(Level, String)>>>;

struct CaptureLayer(Captured);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

/// Run `f` and return every log event it emitted.
pub fn capture_logs(f: impl FnOnce()) -> Vec<(Level, String)> {
    let captured: Captured = Arc::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(Arc::clone(&captured)));
    tracing::subscriber::with_default(subscriber, f);
    let logs = captured.lock().unwrap().clone();
    logs
}
