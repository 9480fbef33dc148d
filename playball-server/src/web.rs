use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use log::{info, warn};
use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_util::sync::CancellationToken;

use crate::recording::{Player, ReplayError, ReplayMode};

/// Latest schedule list, for polling clients
pub const GAMES_URI: &str = "/games";
/// Live-style event stream, one consumer at a time
pub const STREAM_URI: &str = "/streamData";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Socket operation failed")]
    Io(#[from] io::Error),
}

impl IntoResponse for ReplayError {
    fn into_response(self) -> Response {
        match self {
            ReplayError::StreamInUse => (StatusCode::CONFLICT, self.to_string()).into_response(),
        }
    }
}

#[derive(Clone)]
pub struct Web {
    player: Player,
    mode: ReplayMode,
}

impl Web {
    pub fn new(player: Player, mode: ReplayMode) -> Self {
        Web { player, mode }
    }

    pub fn router(self) -> Router {
        let app = Router::new();
        let app = match self.mode {
            ReplayMode::Poll => app.route(GAMES_URI, get(games_handler)),
            ReplayMode::Broadcast => app.route(STREAM_URI, get(stream_handler)),
        };
        app.layer(middleware::from_fn(no_cache_middleware))
            .with_state(self)
    }

    pub async fn run(self, subsys: SubsystemHandle, addr: SocketAddr) -> Result<(), WebError> {
        let listener = TcpListener::bind(addr).await.map_err(WebError::Io)?;
        self.serve(listener, subsys.create_cancellation_token()).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), WebError> {
        let addr = listener.local_addr().map_err(WebError::Io)?;
        let mode = self.mode;
        info!(
            "Starting {} playback server on http://{}{}",
            mode,
            addr,
            match mode {
                ReplayMode::Poll => GAMES_URI,
                ReplayMode::Broadcast => STREAM_URI,
            }
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(WebError::Io)
    }
}

/// Middleware to add no-cache headers to every response
async fn no_cache_middleware(request: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response
}

async fn games_handler(State(state): State<Web>) -> Response {
    let snapshot = state.player.latest().snapshot();
    Json(snapshot.as_ref().clone()).into_response()
}

async fn stream_handler(State(state): State<Web>) -> Response {
    match state.player.attach() {
        Ok(updates) => {
            let events = updates.map(|value| Event::default().json_data(value));
            Sse::new(events)
                .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
                .into_response()
        }
        Err(e) => {
            warn!("Rejecting SSE connection: {}", e);
            e.into_response()
        }
    }
}
