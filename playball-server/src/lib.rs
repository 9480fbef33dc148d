//! # Playball Server
//!
//! Records a live game feed to disk and replays recordings over HTTP.
//!
//! This crate provides:
//! - A recorder that follows the feed's event stream, survives dropped
//!   connections and writes one recording file per segment
//! - A replay server that plays a recording back with its original timing,
//!   either as a polled `/games` endpoint or as an SSE `/streamData` stream
//!
//! ## Architecture
//!
//! The server is built on top of [`playball_core`] for the pure recording and
//! timing logic, with [`tokio`] providing the async runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    playball-server                      │
//! │  ┌─────────────┐         ┌──────────────────────────┐   │
//! │  │ Recorder    │         │ Web (axum)               │   │
//! │  │ (reqwest)   │         │  GET /games  /streamData │   │
//! │  └──────┬──────┘         └────────────▲─────────────┘   │
//! │         │ .stream files               │                 │
//! │         ▼                             │                 │
//! │  ┌──────────────┐  cursor   ┌─────────┴─────────────┐   │
//! │  │ Recording    │──────────▶│ Player                │   │
//! │  │ plain/archive│           │ (clock, cache, gate)  │   │
//! │  └──────────────┘           └───────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options:
//!
//! - `playball record [-f FILE] [--uri URI] [--day] [--skipdays N]`
//! - `playball stream [-f FILE] [--http | --sse] [--speed X] [--archive]`
//! - `-v` / `-q` - Increase or decrease verbosity

use clap::{Args, Parser, Subcommand};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use playball_core::{InvalidSpeed, ReplayClock};

pub mod recording;
pub mod web;

use recording::{RecordSettings, ReplayMode, StreamSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default live feed
pub const DEFAULT_URI: &str = "https://www.blaseball.com/events/streamData";

/// Default recording path prefix; `.stream` is appended when writing
pub const DEFAULT_RECORDING_PREFIX: &str = "blaseballGame";

/// Default recording to stream
pub const DEFAULT_RECORDING_FILE: &str = "blaseballGame.stream";

#[derive(Parser, Clone, Debug)]
#[command(name = "playball", version, about = "Record and stream Blaseball game data feeds")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Mode {
    /// Records a live event stream to a file
    Record(RecordArgs),
    /// Streams a given recording back over SSE or HTTP polling
    Stream(StreamArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// Path to save the recording to
    #[arg(short = 'f', long = "file", default_value = DEFAULT_RECORDING_PREFIX)]
    pub filepath: PathBuf,

    /// URI of the event stream to record
    #[arg(long, default_value = DEFAULT_URI)]
    pub uri: String,

    /// Append the current season and day to the filename, and write out the
    /// previous day to its own file when the day changes
    #[arg(long, default_value_t = false)]
    pub day: bool,

    /// Skip this number of day files before starting to write them. A value
    /// of 1 avoids overwriting a day recorded by an earlier run
    #[arg(long = "skipdays", default_value_t = 0)]
    pub skip_days: u32,
}

#[derive(Args, Clone, Debug)]
pub struct StreamArgs {
    /// Path to read the stream data from
    #[arg(short = 'f', long = "file", default_value = DEFAULT_RECORDING_FILE)]
    pub filepath: PathBuf,

    /// Use HTTP playback on /games for polling clients
    #[arg(long, default_value_t = false)]
    pub http: bool,

    /// Use SSE playback on /streamData. The default if neither this nor --http is given
    #[arg(long, default_value_t = false)]
    pub sse: bool,

    /// Playback rate multiplier
    #[arg(long, default_value_t = 1.0, value_parser = parse_speed)]
    pub speed: f64,

    /// The playback file is a gzip archive of newline-delimited feed documents
    #[arg(long, default_value_t = false)]
    pub archive: bool,

    /// Port for webserver
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Address for webserver
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,
}

impl StreamArgs {
    /// HTTP polling only when asked for without SSE; SSE otherwise
    pub fn replay_mode(&self) -> ReplayMode {
        if self.http && !self.sse {
            ReplayMode::Poll
        } else {
            ReplayMode::Broadcast
        }
    }
}

fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.parse().map_err(|e| format!("{}", e))?;
    ReplayClock::new(speed)
        .map(|clock| clock.speed())
        .map_err(|e| e.to_string())
}

impl From<&RecordArgs> for RecordSettings {
    fn from(args: &RecordArgs) -> Self {
        RecordSettings {
            uri: args.uri.clone(),
            prefix: args.filepath.clone(),
            day_mode: args.day,
            skip_days: args.skip_days,
        }
    }
}

impl TryFrom<&StreamArgs> for StreamSettings {
    type Error = InvalidSpeed;

    fn try_from(args: &StreamArgs) -> Result<Self, Self::Error> {
        Ok(StreamSettings {
            path: args.filepath.clone(),
            archive: args.archive,
            clock: ReplayClock::new(args.speed)?,
            mode: args.replay_mode(),
            addr: SocketAddr::new(args.bind, args.port),
        })
    }
}
