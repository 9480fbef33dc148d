use clap::Parser;
use log::info;
use miette::{IntoDiagnostic, Result};
use std::{convert::Infallible, time::Duration};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use playball_server::{
    recording::{
        open_recording, HttpFrameSource, Player, RecordError, RecordSettings, Recorder,
        ReplayMode, StreamSettings,
    },
    web::Web,
    Cli, Mode, RecordArgs, StreamArgs, VERSION,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();

    info!("playball {}", VERSION);

    match args.mode {
        Mode::Record(record) => record_feed(record).await,
        Mode::Stream(stream) => stream_recording(stream).await,
    }
}

async fn record_feed(args: RecordArgs) -> Result<()> {
    let settings = RecordSettings::from(&args);
    let source = HttpFrameSource::new(settings.uri.clone())
        .map_err(RecordError::from)
        .into_diagnostic()?;
    let recorder = Recorder::new(source, &settings);
    info!("Recording {} to {}", settings.uri, settings.prefix.display());

    Toplevel::new(move |s: SubsystemHandle| async move {
        s.start(SubsystemBuilder::new("Recorder", move |subsys| {
            recorder.run(subsys)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(SHUTDOWN_TIMEOUT)
    .await
    .into_diagnostic()
}

async fn stream_recording(args: StreamArgs) -> Result<()> {
    let settings = StreamSettings::try_from(&args).into_diagnostic()?;
    let cursor = open_recording(&settings.path, settings.archive).into_diagnostic()?;
    info!(
        "Streaming {} over {} at {}x",
        settings.path.display(),
        settings.mode,
        settings.clock.speed()
    );

    Toplevel::new(move |s: SubsystemHandle| async move {
        let player = Player::new(cursor, settings.clock, s.create_cancellation_token());

        if settings.mode == ReplayMode::Poll {
            let poller = player.clone();
            s.start(SubsystemBuilder::new("Player", move |_subsys| async move {
                poller.run_poll().await;
                Ok::<(), Infallible>(())
            }));
        }

        let web = Web::new(player, settings.mode);
        let addr = settings.addr;
        s.start(SubsystemBuilder::new("Webserver", move |subsys| {
            web.run(subsys, addr)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(SHUTDOWN_TIMEOUT)
    .await
    .into_diagnostic()
}
