//! Recording player - replays a recording with its original timing.
//!
//! Two ways to consume a recording:
//! - **Poll**: a background task walks the recording and keeps the latest
//!   schedule in a [`LatestState`] for `/games` to serve.
//! - **Broadcast**: the single SSE consumer pulls entries as they fall due.
//!   The cursor's owned lock travels with the response stream, so a second
//!   consumer is refused until the first one goes away.

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use playball_core::{Materializer, PlaybackCursor, ReplayClock, POLL_INTERVAL};

use super::archive::ArchiveRecording;
use super::file_format::{load_plain, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    Poll,
    Broadcast,
}

impl std::fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayMode::Poll => write!(f, "HTTP"),
            ReplayMode::Broadcast => write!(f, "SSE"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub path: PathBuf,
    pub archive: bool,
    pub clock: ReplayClock,
    pub mode: ReplayMode,
    pub addr: SocketAddr,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Only one open stream is currently supported")]
    StreamInUse,
}

/// How a poll-mode playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Finished,
    Cancelled,
}

/// Cursor plus the last full payload seen on it.
///
/// Both live behind the same gate so a consumer resuming on a compact entry
/// can still expand it.
struct Playback {
    cursor: Box<dyn PlaybackCursor>,
    materializer: Materializer,
}

impl Playback {
    fn new(cursor: Box<dyn PlaybackCursor>) -> Self {
        Playback {
            cursor,
            materializer: Materializer::new(),
        }
    }
}

type SharedPlayback = Arc<Mutex<Playback>>;

/// Open a recording with the backend matching its format
pub fn open_recording(path: &Path, archive: bool) -> Result<Box<dyn PlaybackCursor>, StoreError> {
    if archive {
        let recording = ArchiveRecording::open(path)?;
        info!("Opened archive {}", path.display());
        Ok(Box::new(recording))
    } else {
        let recording = load_plain(path)?;
        info!(
            "Loaded {} messages from {}, last at {:.1}",
            recording.len().unwrap_or_default(),
            path.display(),
            recording.peek_last().map(|e| e.offset).unwrap_or_default()
        );
        Ok(Box::new(recording))
    }
}

/// Most recent schedule list, replaced whole on every update
#[derive(Debug, Clone)]
pub struct LatestState {
    inner: Arc<RwLock<Arc<Value>>>,
}

impl Default for LatestState {
    fn default() -> Self {
        LatestState {
            inner: Arc::new(RwLock::new(Arc::new(Value::Array(Vec::new())))),
        }
    }
}

impl LatestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, value: Value) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(value);
    }

    pub fn snapshot(&self) -> Arc<Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Clone)]
pub struct Player {
    playback: SharedPlayback,
    clock: ReplayClock,
    latest: LatestState,
    cancel: CancellationToken,
}

impl Player {
    pub fn new(cursor: Box<dyn PlaybackCursor>, clock: ReplayClock, cancel: CancellationToken) -> Self {
        Player {
            playback: Arc::new(Mutex::new(Playback::new(cursor))),
            clock,
            latest: LatestState::new(),
            cancel,
        }
    }

    pub fn latest(&self) -> &LatestState {
        &self.latest
    }

    /// Walk the whole recording, publishing each schedule as it falls due
    pub async fn run_poll(&self) -> PollOutcome {
        let mut playback = self.playback.lock().await;
        let last = playback.cursor.peek_last().map(|e| e.offset).unwrap_or_default();
        let start = Instant::now();
        info!("Started HTTP playback at {}x", self.clock.speed());

        loop {
            if self.cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            let due = match playback.cursor.peek_first() {
                None => break,
                Some(entry) => self.clock.is_due(start.elapsed(), entry.offset),
            };
            if !due {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return PollOutcome::Cancelled,
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
                continue;
            }
            let Some(entry) = playback.cursor.advance() else {
                break;
            };
            debug!("HTTP: {:.1}/{:.1}", entry.offset, last);
            match playback.materializer.materialize_schedule(entry.payload) {
                Some(schedule) => self.latest.replace(schedule),
                None => warn!("Skipping update at {:.1} with nothing to expand", entry.offset),
            }
        }

        info!("Finished HTTP playback");
        PollOutcome::Finished
    }

    /// Take the cursor for one SSE consumer.
    ///
    /// Fails at once if another consumer holds it. Playback continues from
    /// wherever the previous consumer left off, with a fresh clock; compact
    /// entries still expand from the last full payload sent before.
    pub fn attach(&self) -> Result<BoxStream<'static, Value>, ReplayError> {
        let guard = self
            .playback
            .clone()
            .try_lock_owned()
            .map_err(|_| ReplayError::StreamInUse)?;
        info!("Started playback due to SSE connection");

        let traversal = Traversal {
            playback: guard,
            clock: self.clock,
            start: Instant::now(),
            cancel: self.cancel.clone(),
        };
        Ok(stream::unfold(traversal, |mut t| async move {
            let value = t.next_due().await?;
            Some((value, t))
        })
        .boxed())
    }
}

/// State of one SSE consumer's walk through the recording
struct Traversal {
    playback: OwnedMutexGuard<Playback>,
    clock: ReplayClock,
    start: Instant,
    cancel: CancellationToken,
}

impl Traversal {
    async fn next_due(&mut self) -> Option<Value> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            let due = match self.playback.cursor.peek_first() {
                None => {
                    info!("Finished SSE playback");
                    return None;
                }
                Some(entry) => self.clock.is_due(self.start.elapsed(), entry.offset),
            };
            if !due {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return None,
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
                continue;
            }
            let playback = &mut *self.playback;
            let entry = playback.cursor.advance()?;
            debug!("SSE: {:.1}", entry.offset);
            match playback.materializer.materialize(entry.payload) {
                Some(value) => return Some(value),
                None => warn!("Skipping update at {:.1} with nothing to expand", entry.offset),
            }
        }
    }
}
