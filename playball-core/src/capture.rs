//! Capture state machine for the recorder.
//!
//! Pure bookkeeping with no I/O: the recorder feeds decoded frames in with
//! the instant they arrived, and gets back what happened to them. Closed
//! segments are handed back to the caller, which owns the writing.

use std::time::Instant;

use serde_json::Value;

use crate::entry::{RecordedEntry, Segment};
use crate::frame::{Frame, GameTally, SimDay};

/// Result of feeding one frame into the capture state
#[derive(Debug, PartialEq)]
pub enum Ingest {
    /// Sequence is older than one already accepted; discarded
    Stale,
    /// Content identical to the previous frame and no sequence to record
    Unchanged,
    /// An entry was appended to the open segment
    Accepted(Accepted),
}

#[derive(Debug, PartialEq)]
pub struct Accepted {
    /// Offset of the appended entry within the open segment
    pub offset: f64,
    pub kind: AcceptedKind,
    /// Season and day tracked after this frame
    pub sim_day: SimDay,
    /// Segment closed by a day change, to be written out by the caller
    pub rollover: Option<Rollover>,
    /// Stale frames discarded since the previous accepted frame
    pub stale_skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptedKind {
    /// New content, stored as the full payload
    Full { tally: GameTally },
    /// Unchanged content, stored as its update sequence only
    Compact { sequence: i64 },
}

/// A segment closed because the simulation moved to a later day
#[derive(Debug, PartialEq)]
pub struct Rollover {
    pub from: SimDay,
    pub to: SimDay,
    pub segment: Segment,
}

/// Everything the recorder accumulates between two segment boundaries
#[derive(Debug)]
pub struct CaptureState {
    day_mode: bool,
    entries: Vec<RecordedEntry>,
    last_games: Option<Value>,
    last_sequence: Option<i64>,
    sim_day: Option<SimDay>,
    segment_start: Option<Instant>,
    stale_skipped: u64,
}

impl CaptureState {
    pub fn new(day_mode: bool) -> Self {
        CaptureState {
            day_mode,
            entries: Vec::new(),
            last_games: None,
            last_sequence: None,
            sim_day: None,
            segment_start: None,
            stale_skipped: 0,
        }
    }

    /// Entries of the segment currently being recorded
    pub fn entries(&self) -> &[RecordedEntry] {
        &self.entries
    }

    pub fn sim_day(&self) -> Option<SimDay> {
        self.sim_day
    }

    pub fn last_sequence(&self) -> Option<i64> {
        self.last_sequence
    }

    /// Feed one decoded frame that arrived at `now`
    pub fn ingest(&mut self, frame: Frame, now: Instant) -> Ingest {
        if let (Some(sequence), Some(last)) = (frame.sequence(), self.last_sequence) {
            if sequence < last {
                self.stale_skipped += 1;
                return Ingest::Stale;
            }
        }

        let unchanged = self
            .last_games
            .as_ref()
            .is_some_and(|games| frame.same_content(games));

        if unchanged {
            let Some(sequence) = frame.sequence() else {
                return Ingest::Unchanged;
            };
            self.last_sequence = Some(sequence);
            let offset = self.offset_at(now);
            self.entries.push(RecordedEntry::compact(offset, sequence));
            return Ingest::Accepted(Accepted {
                offset,
                kind: AcceptedKind::Compact { sequence },
                sim_day: self.sim_day.unwrap_or(frame.sim_day()),
                rollover: None,
                stale_skipped: std::mem::take(&mut self.stale_skipped),
            });
        }

        let day = frame.sim_day();
        let mut rollover = None;
        match self.sim_day {
            None => self.sim_day = Some(day),
            Some(previous) if day > previous => {
                if self.day_mode {
                    rollover = Some(Rollover {
                        from: previous,
                        to: day,
                        segment: self.take_segment(),
                    });
                }
                self.sim_day = Some(day);
            }
            Some(_) => {}
        }

        let tally = frame.tally();
        self.last_games = Some(frame.games().clone());
        if frame.sequence().is_some() {
            self.last_sequence = frame.sequence();
        }

        let offset = self.offset_at(now);
        self.entries.push(RecordedEntry::full(offset, frame.into_raw()));

        Ingest::Accepted(Accepted {
            offset,
            kind: AcceptedKind::Full { tally },
            sim_day: day,
            rollover,
            stale_skipped: std::mem::take(&mut self.stale_skipped),
        })
    }

    /// Close the open segment, labelled with the tracked day.
    ///
    /// The next accepted frame starts a new segment at offset 0.0.
    pub fn take_segment(&mut self) -> Segment {
        self.segment_start = None;
        Segment::new(self.sim_day, std::mem::take(&mut self.entries))
    }

    fn offset_at(&mut self, now: Instant) -> f64 {
        let start = *self.segment_start.get_or_insert(now);
        now.saturating_duration_since(start).as_secs_f64()
    }
}
