//! Live event stream sources.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use log::debug;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::time::Duration;
use thiserror::Error;

use playball_core::EventFramer;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures of the feed connection. All of them are worth a reconnect.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("Stream is not connected")]
    NotConnected,
}

/// A connection to the live feed yielding the text of each event
#[async_trait]
pub trait FrameSource: Send {
    /// Open a fresh connection, dropping any previous one
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Next event payload; `Ok(None)` when the server closed the stream
    async fn next_frame(&mut self) -> Result<Option<String>, SourceError>;

    /// Where the events come from, for logging
    fn describe(&self) -> String;
}

pub struct HttpFrameSource {
    client: reqwest::Client,
    uri: String,
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    framer: EventFramer,
}

impl HttpFrameSource {
    pub fn new(uri: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(HttpFrameSource {
            client,
            uri: uri.into(),
            body: None,
            framer: EventFramer::new(),
        })
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        self.body = None;
        self.framer.reset();

        let response = self
            .client
            .get(&self.uri)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }
        debug!("Connected to {} ({})", self.uri, status);

        self.body = Some(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
        );
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            if let Some(event) = self.framer.next_event() {
                return Ok(Some(event));
            }
            let body = self.body.as_mut().ok_or(SourceError::NotConnected)?;
            match body.next().await {
                Some(Ok(chunk)) => self.framer.push(&chunk),
                Some(Err(e)) => {
                    self.body = None;
                    return Err(e.into());
                }
                None => {
                    self.body = None;
                    return Ok(None);
                }
            }
        }
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }
}
