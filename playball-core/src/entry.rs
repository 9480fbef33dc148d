//! Recorded entries and segments.
//!
//! On disk a segment is one JSON array of `[offsetSeconds, payload]` pairs:
//!
//! ```text
//! [
//!   [0.0,   {"value": {"games": {...}, "lastUpdateTime": 17}}],   full entry
//!   [4.02,  18],                                                  compact entry
//!   [8.13,  {"value": {"games": {...}, "lastUpdateTime": 19}}]
//! ]
//! ```
//!
//! A compact entry stands for "the previous full payload, with its update
//! sequence replaced by this integer".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::SimDay;

/// Payload half of a recorded entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPayload {
    /// Update sequence of a frame whose content equals the previous full payload
    Compact(i64),
    /// Complete frame as received
    Full(Value),
}

/// One `(offset, payload)` pair of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEntry", into = "WireEntry")]
pub struct RecordedEntry {
    /// Seconds since the start of the segment
    pub offset: f64,
    pub payload: EntryPayload,
}

#[derive(Serialize, Deserialize)]
struct WireEntry(f64, EntryPayload);

impl From<WireEntry> for RecordedEntry {
    fn from(wire: WireEntry) -> Self {
        RecordedEntry {
            offset: wire.0,
            payload: wire.1,
        }
    }
}

impl From<RecordedEntry> for WireEntry {
    fn from(entry: RecordedEntry) -> Self {
        WireEntry(entry.offset, entry.payload)
    }
}

impl RecordedEntry {
    pub fn full(offset: f64, payload: Value) -> Self {
        Self {
            offset,
            payload: EntryPayload::Full(payload),
        }
    }

    pub fn compact(offset: f64, sequence: i64) -> Self {
        Self {
            offset,
            payload: EntryPayload::Compact(sequence),
        }
    }

    pub fn is_compact(&self) -> bool {
        matches!(self.payload, EntryPayload::Compact(_))
    }
}

/// One physical recording file's worth of entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// Season and day the segment covers, once one has been observed
    pub sim_day: Option<SimDay>,
    pub entries: Vec<RecordedEntry>,
}

impl Segment {
    pub fn new(sim_day: Option<SimDay>, entries: Vec<RecordedEntry>) -> Self {
        Self { sim_day, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Offset of the final entry, 0.0 for an empty segment
    pub fn duration(&self) -> f64 {
        self.entries.last().map(|e| e.offset).unwrap_or(0.0)
    }
}
