//! Error types for frame decoding and replay configuration

use thiserror::Error;

/// Errors that can occur when decoding a feed frame
#[derive(Error, Debug)]
pub enum FrameError {
    /// Payload is not valid JSON
    #[error("Frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A section every schema revision requires is absent
    #[error("Frame is missing required section '{0}'")]
    MissingSection(&'static str),

    /// `value` has neither a nested `games` document nor a flat `sim` section
    #[error("Frame does not match any known schema revision")]
    UnknownSchema,

    /// `sim.season` or `sim.day` is not an integer
    #[error("Invalid sim field '{0}': expected an integer")]
    InvalidSimField(&'static str),

    /// `lastUpdateTime` is present but not an integer
    #[error("Invalid update sequence {0}: expected an integer")]
    InvalidSequence(String),

    /// `schedule` is not a list
    #[error("Frame schedule is not a list")]
    InvalidSchedule,
}

/// Playback speed must be a finite, strictly positive multiplier
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Invalid playback speed {0}: must be a finite number greater than zero")]
pub struct InvalidSpeed(pub f64);
