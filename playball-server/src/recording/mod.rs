//! Feed recording and playback.
//!
//! This module provides functionality to:
//! - Record the live feed to `.stream` files, one per segment
//! - Read recordings back, either plain `.stream` files or gzip archives
//! - Play a recording back with its original timing
//!
//! ## File Format
//!
//! A `.stream` file is one JSON array; each element is an
//! `[offset, payload]` pair:
//!
//! ```text
//! [
//!   [0.0,  {"value": {"games": {...}, "lastUpdateTime": 1000}}],   full
//!   [4.02, 1004],                                                   compact
//!   [9.87, {"value": {"games": {...}, "lastUpdateTime": 1009}}]
//! ]
//! ```
//!
//! `offset` is seconds since the segment's first entry. A bare integer is an
//! update whose content matched the previous full payload; only its
//! `lastUpdateTime` is kept.

pub mod archive;
pub mod file_format;
pub mod player;
pub mod recorder;
pub mod source;

pub use archive::ArchiveRecording;
pub use file_format::{load_plain, SegmentWriter, StoreError, WriteKind, WriteResult};
pub use player::{
    open_recording, LatestState, Player, PollOutcome, ReplayError, ReplayMode, StreamSettings,
};
pub use recorder::{RecordError, RecordOutcome, RecordSettings, Recorder};
pub use source::{FrameSource, HttpFrameSource, SourceError};
