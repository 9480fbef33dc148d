//! # Playball Core
//!
//! Platform-independent logic for recording a live game feed and replaying
//! it with its original timing.
//!
//! This crate contains pure decoding and state-machine logic with **zero I/O
//! dependencies**: no async runtime, no sockets, no file system. Everything
//! that waits on the network or touches disk lives in `playball-server`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  playball-core (no tokio/async deps)                        │
//! │  ├── frame/        (wire schema revisions → Frame)          │
//! │  ├── entry/        (recorded entries, segment file shape)   │
//! │  ├── capture/      (dedup, ordering, day rollover)          │
//! │  ├── connection/   (reconnect budget and backoff)           │
//! │  ├── clock/        (replay clock)                           │
//! │  ├── cursor/       (PlaybackCursor, in-memory backend)      │
//! │  ├── materialize/  (compact entry expansion)                │
//! │  └── sse/          (event-stream framing)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  playball-server        │
//!                 │  (recorder, replay, web)│
//!                 └─────────────────────────┘
//! ```
//!
//! ## Example: Recording Two Identical Frames
//!
//! ```rust
//! use playball_core::{CaptureState, Frame, EntryPayload};
//! use std::time::{Duration, Instant};
//!
//! let text = |seq: i64| format!(
//!     r#"{{"value": {{"games": {{"sim": {{"season": 1, "day": 2}}, "schedule": []}}, "lastUpdateTime": {}}}}}"#,
//!     seq
//! );
//!
//! let start = Instant::now();
//! let mut capture = CaptureState::new(false);
//! capture.ingest(Frame::decode(&text(1)).unwrap(), start);
//! capture.ingest(Frame::decode(&text(2)).unwrap(), start + Duration::from_secs(1));
//!
//! let entries = capture.entries();
//! assert!(matches!(entries[0].payload, EntryPayload::Full(_)));
//! assert_eq!(entries[1].payload, EntryPayload::Compact(2));
//! ```

pub mod capture;
pub mod clock;
pub mod connection;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod frame;
pub mod materialize;
pub mod sse;

pub use capture::{Accepted, AcceptedKind, CaptureState, Ingest, Rollover};
pub use clock::{due_position, ReplayClock, POLL_INTERVAL};
pub use connection::{ConnectionManager, ConnectionState};
pub use cursor::{PlainRecording, PlaybackCursor};
pub use entry::{EntryPayload, RecordedEntry, Segment};
pub use error::{FrameError, InvalidSpeed};
pub use frame::{nest_games, Frame, FrameSchema, GameTally, SimDay};
pub use materialize::Materializer;
pub use sse::EventFramer;
