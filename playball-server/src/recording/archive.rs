//! Gzip archive recordings.
//!
//! An archive holds one games document per line, each carrying the capture
//! time in milliseconds at `clientMeta.timestamp`. Lines are decompressed
//! and parsed only as the cursor advances, so archives of any size replay
//! in constant memory. Concatenated gzip members are read as one stream.

use flate2::read::MultiGzDecoder;
use log::{error, warn};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::{Path, PathBuf};

use playball_core::{nest_games, PlaybackCursor, RecordedEntry};

use super::file_format::StoreError;

type LineReader = Lines<Box<dyn BufRead + Send>>;

pub struct ArchiveRecording {
    lines: LineReader,
    label: PathBuf,
    current: Option<RecordedEntry>,
    start_ms: f64,
    line_no: usize,
    placeholder: RecordedEntry,
}

impl std::fmt::Debug for ArchiveRecording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRecording")
            .field("label", &self.label)
            .field("line_no", &self.line_no)
            .field("current", &self.current.as_ref().map(|e| e.offset))
            .finish()
    }
}

impl ArchiveRecording {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_gzip(file, path)
    }

    /// Read an archive from any gzip byte source; `label` names it in logs
    pub fn from_gzip<R: Read + Send + 'static>(reader: R, label: &Path) -> Result<Self, StoreError> {
        let buffered: Box<dyn BufRead + Send> = Box::new(BufReader::new(MultiGzDecoder::new(reader)));
        let mut archive = ArchiveRecording {
            lines: buffered.lines(),
            label: label.to_path_buf(),
            current: None,
            start_ms: 0.0,
            line_no: 0,
            placeholder: RecordedEntry::full(0.0, Value::Object(Default::default())),
        };

        let (start_ms, games) = archive
            .next_document()
            .ok_or_else(|| StoreError::Empty(label.to_path_buf()))?;
        archive.start_ms = start_ms;
        archive.current = Some(RecordedEntry::full(0.0, nest_games(games)));
        Ok(archive)
    }

    /// Next well-formed line as (timestamp ms, games document).
    ///
    /// Malformed lines are skipped; a read error ends the archive.
    fn next_document(&mut self) -> Option<(f64, Value)> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!(
                        "Archive {} unreadable at line {}: {}",
                        self.label.display(),
                        self.line_no,
                        e
                    );
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let games: Value = match serde_json::from_str(&line) {
                Ok(games) => games,
                Err(e) => {
                    warn!(
                        "Skipping malformed line {} of {}: {}",
                        self.line_no,
                        self.label.display(),
                        e
                    );
                    continue;
                }
            };
            let Some(timestamp) = games
                .get("clientMeta")
                .and_then(|meta| meta.get("timestamp"))
                .and_then(Value::as_f64)
            else {
                warn!(
                    "Skipping line {} of {}: no clientMeta.timestamp",
                    self.line_no,
                    self.label.display()
                );
                continue;
            };
            return Some((timestamp, games));
        }
        None
    }
}

impl PlaybackCursor for ArchiveRecording {
    fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    fn peek_first(&self) -> Option<&RecordedEntry> {
        self.current.as_ref()
    }

    /// The end of an archive is unknown without decompressing all of it
    fn peek_last(&self) -> Option<&RecordedEntry> {
        Some(&self.placeholder)
    }

    fn advance(&mut self) -> Option<RecordedEntry> {
        let entry = self.current.take()?;
        self.current = self.next_document().map(|(timestamp, games)| {
            let offset = ((timestamp - self.start_ms) / 1000.0).max(0.0);
            RecordedEntry::full(offset, nest_games(games))
        });
        Some(entry)
    }

    fn len(&self) -> Option<usize> {
        None
    }
}
