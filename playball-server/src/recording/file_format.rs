//! Recording files on disk.
//!
//! A plain recording is a single JSON array of `[offset, payload]` pairs.
//! The file name is built from the recorder's prefix:
//!
//! ```text
//! <prefix>[.s<season>d<day>][.errorDump].stream
//! ```
//!
//! The day label is present only in day mode and only once a day has been
//! observed.

use log::info;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use playball_core::{PlainRecording, PlaybackCursor, Segment};

pub const RECORDING_EXTENSION: &str = "stream";
pub const ERROR_DUMP_LABEL: &str = "errorDump";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid recording data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Recording {0} holds no entries")]
    Empty(PathBuf),
}

/// Why a segment is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The sim day changed; the closed day goes to its own file
    Rollover,
    /// Interrupt or reconnect budget spent
    Final,
    /// Unrecoverable failure; whatever is buffered is saved
    ErrorDump,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf, entries: usize },
    SkippedEmpty,
    /// A rollover write suppressed by the skip-days budget
    SkippedDay { remaining: u32 },
}

/// Writes closed segments to `.stream` files
#[derive(Debug, Clone)]
pub struct SegmentWriter {
    prefix: PathBuf,
    day_mode: bool,
    skip_days: u32,
}

impl SegmentWriter {
    pub fn new(prefix: impl Into<PathBuf>, day_mode: bool, skip_days: u32) -> Self {
        SegmentWriter {
            prefix: prefix.into(),
            day_mode,
            skip_days,
        }
    }

    pub fn path_for(&self, segment: &Segment, kind: WriteKind) -> PathBuf {
        let mut name = OsString::from(self.prefix.as_os_str());
        if self.day_mode {
            if let Some(day) = segment.sim_day {
                name.push(format!(".{}", day));
            }
        }
        if kind == WriteKind::ErrorDump {
            name.push(format!(".{}", ERROR_DUMP_LABEL));
        }
        name.push(format!(".{}", RECORDING_EXTENSION));
        PathBuf::from(name)
    }

    /// Write one segment, replacing any file already at its path.
    ///
    /// Empty segments never produce a file. Rollovers consume the skip-days
    /// budget before anything is written.
    pub fn write(&mut self, segment: &Segment, kind: WriteKind) -> Result<WriteResult, StoreError> {
        if segment.is_empty() {
            info!("Skipping file write, no messages");
            return Ok(WriteResult::SkippedEmpty);
        }
        if kind == WriteKind::Rollover && self.skip_days > 0 {
            self.skip_days -= 1;
            info!("Skipping day, {} skips remaining", self.skip_days);
            return Ok(WriteResult::SkippedDay {
                remaining: self.skip_days,
            });
        }

        let path = self.path_for(segment, kind);
        let file = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &segment.entries).map_err(|source| {
            StoreError::Json {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Recorded {} messages to {}", segment.len(), path.display());
        Ok(WriteResult::Written {
            path,
            entries: segment.len(),
        })
    }
}

/// Load a plain recording fully into memory
pub fn load_plain(path: &Path) -> Result<PlainRecording, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let recording = PlainRecording::from_json_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if recording.is_empty() {
        return Err(StoreError::Empty(path.to_path_buf()));
    }
    Ok(recording)
}
