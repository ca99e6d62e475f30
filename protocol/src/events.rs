//! # Event Sink
//!
//! Every successful state change emits exactly one structured [`Event`].
//! Sinks are fire-and-forget: the engine never reads a response and a sink
//! must not be able to fail an operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::identity::Identity;

/// An audit record for a committed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,
    /// Operation name, e.g. `"distribute"`.
    pub action: String,
    /// What the operation acted on, usually a container reference.
    pub subject: String,
    /// Who performed it.
    pub actor: Identity,
    /// Ledger height at which it was committed.
    pub height: u64,
    /// Operation-specific fields (amounts, statuses, parties).
    pub fields: BTreeMap<String, Value>,
    /// Wall-clock time the event was recorded. Informational only.
    pub recorded_at: DateTime<Utc>,
}

impl Event {
    pub fn new(action: impl Into<String>, subject: impl Into<String>, actor: &Identity, height: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            subject: subject.into(),
            actor: actor.clone(),
            height,
            fields: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Consumer of engine events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}

/// Forwards events to `tracing` at INFO under the `holdfast::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        let fields = serde_json::to_string(&event.fields).unwrap_or_default();
        tracing::info!(
            target: "holdfast::events",
            id = %event.id,
            action = %event.action,
            subject = %event.subject,
            actor = %event.actor,
            height = event.height,
            fields = %fields,
            "escrow event"
        );
    }
}

/// Buffers events in memory. Tests inspect it; the node drains it.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Sends every event to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: Event) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}
