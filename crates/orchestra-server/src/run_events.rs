//! Registry of in-flight runs, so `WS /execution/{run_id}` can mirror a
//! run's events rather than starting one of its own.

use std::collections::HashMap;

use orchestra_core::{Event, EventSink};
use tokio::sync::{broadcast, RwLock};

pub type RunEvents = RwLock<HashMap<String, broadcast::Sender<Event>>>;

/// Forwards every emitted event to a broadcast channel. Send errors
/// (no subscribers yet) are expected and silently dropped.
pub struct BroadcastSink(pub broadcast::Sender<Event>);

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        let _ = self.0.send(event);
    }
}
