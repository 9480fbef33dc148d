//! Expansion of recorded entries back into full payloads.

use serde_json::Value;

use crate::entry::EntryPayload;
use crate::frame::{graft_sequence, schedule_of};

/// Remembers the last full payload so compact entries can be expanded.
///
/// One materializer per recording, shared by every consumer of it; both
/// replay modes use it so they expose identical payloads.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    last_full: Option<Value>,
}

impl Materializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn a recorded payload into the payload the live feed sent.
    ///
    /// Returns `None` for a compact entry with no full payload before it.
    pub fn materialize(&mut self, payload: EntryPayload) -> Option<Value> {
        match payload {
            EntryPayload::Full(value) => {
                self.last_full = Some(value.clone());
                Some(value)
            }
            EntryPayload::Compact(sequence) => {
                let last = self.last_full.as_mut()?;
                graft_sequence(last, sequence);
                Some(last.clone())
            }
        }
    }

    /// Materialize and keep only the schedule list, as served by `/games`
    pub fn materialize_schedule(&mut self, payload: EntryPayload) -> Option<Value> {
        let value = self.materialize(payload)?;
        Some(schedule_of(&value).cloned().unwrap_or(Value::Array(Vec::new())))
    }
}
