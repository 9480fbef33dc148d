//! Recorder - follows the live feed and writes it to `.stream` files.
//!
//! The recorder owns the connection loop: every frame is decoded, run
//! through [`CaptureState`] and, when a day ends, the closed segment goes
//! straight to the [`SegmentWriter`]. Whatever is still buffered when the
//! loop stops is flushed once, either as the final file or as an error dump.
//! File writes run on the blocking pool so a large day does not stall the
//! runtime.

use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_util::sync::CancellationToken;

use playball_core::{
    AcceptedKind, CaptureState, ConnectionManager, Frame, FrameError, FrameSchema, Ingest,
    Rollover, Segment,
};

use super::file_format::{SegmentWriter, StoreError, WriteKind, WriteResult};
use super::source::{FrameSource, SourceError};

#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub uri: String,
    pub prefix: PathBuf,
    pub day_mode: bool,
    pub skip_days: u32,
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Cannot decode frame: {0}")]
    Frame(#[from] FrameError),
    #[error("Cannot write recording: {0}")]
    Store(#[from] StoreError),
    #[error("Cannot set up feed connection: {0}")]
    Source(#[from] SourceError),
    #[error("Writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// How a recording session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Interrupted,
    ReconnectsExhausted,
}

pub struct Recorder<S: FrameSource> {
    source: S,
    capture: CaptureState,
    writer: SegmentWriter,
    connection: ConnectionManager,
    schema: Option<FrameSchema>,
}

impl<S: FrameSource> Recorder<S> {
    pub fn new(source: S, settings: &RecordSettings) -> Self {
        Recorder {
            source,
            capture: CaptureState::new(settings.day_mode),
            writer: SegmentWriter::new(&settings.prefix, settings.day_mode, settings.skip_days),
            connection: ConnectionManager::new(),
            schema: None,
        }
    }

    /// Replace the default reconnect policy
    pub fn with_connection(mut self, connection: ConnectionManager) -> Self {
        self.connection = connection;
        self
    }

    /// Subsystem entry point
    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), RecordError> {
        let outcome = self.record(subsys.create_cancellation_token()).await?;
        debug!("Recorder stopped: {:?}", outcome);
        Ok(())
    }

    /// Record until interrupted, out of reconnects, or failed.
    ///
    /// The open segment is flushed exactly once on every path out.
    pub async fn record(&mut self, cancel: CancellationToken) -> Result<RecordOutcome, RecordError> {
        match self.connection_loop(&cancel).await {
            Ok(outcome) => {
                if outcome == RecordOutcome::Interrupted {
                    info!("Recording interrupted, saving");
                }
                let segment = Arc::new(self.capture.take_segment());
                self.write_segment(segment, WriteKind::Final).await?;
                Ok(outcome)
            }
            Err(e) => {
                error!("Dumping due to error: {}", e);
                let segment = Arc::new(self.capture.take_segment());
                if let Err(dump) = self.write_segment(segment, WriteKind::ErrorDump).await {
                    error!("Error dump failed too: {}", dump);
                }
                Err(e)
            }
        }
    }

    async fn connection_loop(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<RecordOutcome, RecordError> {
        while self.connection.should_reconnect() {
            self.connection.start_connecting();
            debug!("Connecting to {}", self.source.describe());

            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.source.connect() => Some(r),
            };
            let Some(connected) = connected else {
                self.connection.shutdown();
                return Ok(RecordOutcome::Interrupted);
            };
            if let Err(e) = connected {
                if self.back_off(e, cancel).await {
                    return Ok(RecordOutcome::Interrupted);
                }
                continue;
            }

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = self.source.next_frame() => Some(next),
                };
                let Some(next) = next else {
                    self.connection.shutdown();
                    return Ok(RecordOutcome::Interrupted);
                };
                match next {
                    Ok(Some(text)) => self.process(&text).await?,
                    Ok(None) => {
                        self.connection.closed_cleanly();
                        info!(
                            "Reconnecting {}/{}...",
                            self.connection.failure_count(),
                            self.connection.max_attempts()
                        );
                        break;
                    }
                    Err(e) => {
                        if self.back_off(e, cancel).await {
                            return Ok(RecordOutcome::Interrupted);
                        }
                        break;
                    }
                }
            }
        }

        warn!(
            "Giving up after {} failed connection attempts",
            self.connection.failure_count()
        );
        Ok(RecordOutcome::ReconnectsExhausted)
    }

    /// Count a failed attempt and wait it out. True if interrupted meanwhile.
    async fn back_off(&mut self, error: SourceError, cancel: &CancellationToken) -> bool {
        warn!("Request exception: {}", error);
        let delay = self.connection.error();
        info!(
            "Reconnecting {}/{}...",
            self.connection.failure_count(),
            self.connection.max_attempts()
        );
        if delay.is_zero() {
            return false;
        }
        debug!("Waiting {:?} before reconnecting", delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.connection.shutdown();
                true
            }
            _ = tokio::time::sleep(delay) => false,
        }
    }

    async fn process(&mut self, text: &str) -> Result<(), RecordError> {
        let frame = Frame::decode(text)?;
        self.connection.frame_received();
        if self.schema != Some(frame.schema()) {
            info!("Feed frames use the {} schema", frame.schema());
            self.schema = Some(frame.schema());
        }

        let sequence = frame.sequence();
        let accepted = match self.capture.ingest(frame, Instant::now()) {
            Ingest::Stale => {
                debug!("Discarding stale frame {:?}", sequence);
                return Ok(());
            }
            Ingest::Unchanged => {
                debug!("Unchanged frame without sequence");
                return Ok(());
            }
            Ingest::Accepted(accepted) => accepted,
        };

        if accepted.stale_skipped > 0 {
            info!("Skipped {} stale frames", accepted.stale_skipped);
        }
        if let Some(rollover) = accepted.rollover {
            self.roll_over(rollover).await?;
        }
        match accepted.kind {
            AcceptedKind::Full { tally } => {
                info!("{:.1}: {} {}", accepted.offset, accepted.sim_day, tally);
            }
            AcceptedKind::Compact { sequence } => {
                debug!("{:.1}: unchanged, update {}", accepted.offset, sequence);
            }
        }
        Ok(())
    }

    async fn roll_over(&mut self, rollover: Rollover) -> Result<(), RecordError> {
        info!(
            "Day change: {} -> {} ({} messages over {:.1}s)",
            rollover.from,
            rollover.to,
            rollover.segment.len(),
            rollover.segment.duration()
        );
        let segment = Arc::new(rollover.segment);
        match self.write_segment(segment.clone(), WriteKind::Rollover).await {
            Ok(WriteResult::Written { .. })
            | Ok(WriteResult::SkippedEmpty)
            | Ok(WriteResult::SkippedDay { .. }) => Ok(()),
            Err(e) => {
                error!("Dumping day {} due to error: {}", rollover.from, e);
                if let Err(dump) = self.write_segment(segment, WriteKind::ErrorDump).await {
                    error!("Error dump failed too: {}", dump);
                }
                Err(e)
            }
        }
    }

    /// Write on the blocking pool; the writer's skip budget carries over
    async fn write_segment(
        &mut self,
        segment: Arc<Segment>,
        kind: WriteKind,
    ) -> Result<WriteResult, RecordError> {
        let mut writer = self.writer.clone();
        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write(&segment, kind);
            (writer, result)
        })
        .await?;
        self.writer = writer;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use playball_core::{EntryPayload, PlaybackCursor};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::time::Duration;

    use crate::recording::file_format::load_plain;

    enum Step {
        Frame(String),
        Close,
        Fail,
        Hang,
    }

    struct ScriptedSource {
        script: VecDeque<Step>,
        connects: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Step>) -> Self {
            ScriptedSource {
                script: script.into(),
                connects: 0,
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn connect(&mut self) -> Result<(), SourceError> {
            self.connects += 1;
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<String>, SourceError> {
            match self.script.pop_front() {
                Some(Step::Frame(text)) => Ok(Some(text)),
                Some(Step::Close) | None => Ok(None),
                Some(Step::Fail) => Err(SourceError::NotConnected),
                Some(Step::Hang) => std::future::pending().await,
            }
        }

        fn describe(&self) -> String {
            "script".to_string()
        }
    }

    fn frame(day: i64, marker: &str, sequence: i64) -> Step {
        Step::Frame(
            json!({"value": {
                "games": {
                    "sim": {"season": 1, "day": day},
                    "schedule": [{"id": marker, "gameStart": true, "gameComplete": false}]
                },
                "lastUpdateTime": sequence
            }})
            .to_string(),
        )
    }

    fn recorder(
        script: Vec<Step>,
        prefix: &Path,
        day_mode: bool,
        skip_days: u32,
    ) -> Recorder<ScriptedSource> {
        let settings = RecordSettings {
            uri: "script".to_string(),
            prefix: prefix.to_path_buf(),
            day_mode,
            skip_days,
        };
        Recorder::new(ScriptedSource::new(script), &settings)
            .with_connection(ConnectionManager::with_policy(5, Duration::ZERO))
    }

    fn payloads(path: &Path) -> Vec<EntryPayload> {
        let mut recording = load_plain(path).unwrap();
        let mut out = Vec::new();
        while let Some(entry) = recording.advance() {
            out.push(entry.payload);
        }
        out
    }

    #[tokio::test]
    async fn test_budget_of_five_clean_closures() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let mut rec = recorder(vec![frame(1, "a", 1)], &prefix, false, 0);

        let outcome = rec.record(CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::ReconnectsExhausted);
        assert_eq!(rec.source.connects, 5);
        assert_eq!(payloads(&prefix.with_extension("stream")).len(), 1);
    }

    #[tokio::test]
    async fn test_frames_reset_the_budget() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let script = vec![
            Step::Fail,
            Step::Close,
            Step::Close,
            Step::Fail,
            frame(1, "a", 1),
            Step::Close,
        ];
        let mut rec = recorder(script, &prefix, false, 0);

        rec.record(CancellationToken::new()).await.unwrap();
        // 4 failures, one success that resets, then 5 more closures
        assert_eq!(rec.source.connects, 9);
    }

    #[tokio::test]
    async fn test_dedup_writes_compact_entries() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let script = vec![
            frame(1, "a", 10),
            frame(1, "a", 11),
            frame(1, "a", 9),
            frame(1, "b", 12),
        ];
        let mut rec = recorder(script, &prefix, false, 0);
        rec.record(CancellationToken::new()).await.unwrap();

        let written = payloads(&prefix.with_extension("stream"));
        assert_eq!(written.len(), 3);
        assert!(matches!(written[0], EntryPayload::Full(_)));
        assert_eq!(written[1], EntryPayload::Compact(11));
        assert!(matches!(written[2], EntryPayload::Full(_)));
    }

    #[tokio::test]
    async fn test_day_rotation_and_skip_days() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let script = vec![
            frame(3, "a", 1),
            frame(3, "b", 2),
            frame(4, "c", 3),
            frame(5, "d", 4),
            frame(5, "d", 5),
        ];
        let mut rec = recorder(script, &prefix, true, 1);
        rec.record(CancellationToken::new()).await.unwrap();

        assert!(!dir.path().join("game.s1d3.stream").exists());
        assert_eq!(payloads(&dir.path().join("game.s1d4.stream")).len(), 1);

        let mut last = load_plain(&dir.path().join("game.s1d5.stream")).unwrap();
        assert_eq!(last.len(), Some(2));
        assert_eq!(last.advance().unwrap().offset, 0.0);
        assert_eq!(last.advance().unwrap().payload, EntryPayload::Compact(5));
    }

    #[tokio::test]
    async fn test_decode_failure_dumps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let script = vec![frame(1, "a", 1), Step::Frame("{not json".to_string())];
        let mut rec = recorder(script, &prefix, false, 0);

        let result = rec.record(CancellationToken::new()).await;
        assert!(matches!(result, Err(RecordError::Frame(_))));
        assert!(!dir.path().join("game.stream").exists());
        assert_eq!(payloads(&dir.path().join("game.errorDump.stream")).len(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_flushes_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let script = vec![frame(1, "a", 1), frame(1, "b", 2), Step::Hang];
        let mut rec = recorder(script, &prefix, false, 0);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = rec.record(cancel).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Interrupted);
        assert_eq!(payloads(&prefix.with_extension("stream")).len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_recorded_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let mut rec = recorder(Vec::new(), &prefix, false, 0);

        let outcome = rec.record(CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::ReconnectsExhausted);
        assert_eq!(rec.source.connects, 5);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rollover_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing").join("game");
        let script = vec![frame(1, "a", 1), frame(2, "b", 2), frame(2, "c", 3)];
        let mut rec = recorder(script, &prefix, true, 0);

        let result = rec.record(CancellationToken::new()).await;
        assert!(matches!(result, Err(RecordError::Store(StoreError::Io { .. }))));
        // the day-2 frame after the failed rollover is never reached
        assert_eq!(rec.source.script.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_schema_tracked_from_frames() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("game");
        let flat = Step::Frame(
            json!({"value": {"sim": {"season": 1, "day": 1}, "schedule": [{"id": "z"}]}})
                .to_string(),
        );
        let mut rec = recorder(vec![frame(1, "a", 1)], &prefix, false, 0);
        assert_eq!(rec.schema, None);

        rec.record(CancellationToken::new()).await.unwrap();
        assert_eq!(rec.schema, Some(FrameSchema::NestedSequenced));
        assert_eq!(rec.schema.unwrap().to_string(), "nested-sequenced");

        let mut rec = recorder(vec![flat], &prefix, false, 0);
        rec.record(CancellationToken::new()).await.unwrap();
        assert_eq!(rec.schema.map(|s| s.to_string()).as_deref(), Some("flat"));
    }
}
