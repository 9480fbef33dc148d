//! Forward-only playback cursor over a recording.
//!
//! Every recording backend exposes the same four operations so the replay
//! engine does not care where entries come from. [`PlainRecording`] lives
//! here because it is pure; the gzip archive backend is in the server
//! crate since it reads from disk lazily.

use std::collections::VecDeque;

use crate::entry::RecordedEntry;

/// Single-traversal cursor over recorded entries
pub trait PlaybackCursor: Send {
    /// True once every entry has been consumed
    fn is_empty(&self) -> bool;

    /// Next entry without consuming it
    fn peek_first(&self) -> Option<&RecordedEntry>;

    /// Final entry of the recording.
    ///
    /// Backends that cannot answer without scanning ahead return a
    /// placeholder instead; callers must only use this for display.
    fn peek_last(&self) -> Option<&RecordedEntry>;

    /// Consume and return the next entry
    fn advance(&mut self) -> Option<RecordedEntry>;

    /// Number of entries originally loaded, when known
    fn len(&self) -> Option<usize>;
}

/// A recording loaded fully into memory
#[derive(Debug, Clone, Default)]
pub struct PlainRecording {
    entries: VecDeque<RecordedEntry>,
    loaded: usize,
}

impl PlainRecording {
    pub fn new(entries: Vec<RecordedEntry>) -> Self {
        let loaded = entries.len();
        PlainRecording {
            entries: entries.into(),
            loaded,
        }
    }

    /// Parse the JSON array written by the recorder
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let entries: Vec<RecordedEntry> = serde_json::from_slice(bytes)?;
        Ok(Self::new(entries))
    }

    /// Entries not yet consumed
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl PlaybackCursor for PlainRecording {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn peek_first(&self) -> Option<&RecordedEntry> {
        self.entries.front()
    }

    fn peek_last(&self) -> Option<&RecordedEntry> {
        self.entries.back()
    }

    fn advance(&mut self) -> Option<RecordedEntry> {
        self.entries.pop_front()
    }

    fn len(&self) -> Option<usize> {
        Some(self.loaded)
    }
}
