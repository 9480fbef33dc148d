//! Connection state machine for the live feed.
//!
//! This module decides *whether* and *when* the recorder reconnects; the
//! actual HTTP work is done by the server's frame source.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ frame  ┌───────────┐ clean close ┌──────────────┐
//! │  Connecting  │───────▶│ Streaming │────────────▶│ Disconnected │──┐
//! └──────────────┘        └───────────┘             └──────────────┘  │
//!        ▲   │ error           │ error                               │
//!        │   ▼                 ▼                                     │
//!        │ ┌─────────────────────────┐  5 failed attempts  ┌───────────┐
//!        └─│ Backoff (5s × attempts) │────────────────────▶│ Exhausted │
//!          └─────────────────────────┘                     └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use playball_core::connection::{ConnectionManager, ConnectionState};
//!
//! let mut conn = ConnectionManager::new();
//! conn.start_connecting();
//! conn.frame_received();
//! assert_eq!(conn.failure_count(), 0);
//!
//! let delay = conn.error();
//! assert_eq!(delay.as_secs(), 5);
//! assert_eq!(conn.state(), ConnectionState::Backoff);
//! ```

use std::time::Duration;

/// Consecutive failed attempts after which the recorder gives up
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Backoff per failed attempt after a transport error
pub const BACKOFF_UNIT: Duration = Duration::from_secs(5);

/// Connection state of the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, reconnect immediately
    Disconnected,
    /// Connection attempt in progress
    Connecting,
    /// Connected and receiving frames
    Streaming,
    /// Transport error, waiting before the next attempt
    Backoff,
    /// Attempt budget used up, no more connection attempts
    Exhausted,
    /// Shutting down, no more connection attempts
    ShuttingDown,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl ConnectionState {
    /// Check if we should attempt reconnection
    pub fn should_reconnect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Backoff
        )
    }

    /// Check if the connection loop is finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Exhausted | ConnectionState::ShuttingDown
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Streaming => write!(f, "Streaming"),
            ConnectionState::Backoff => write!(f, "Backoff"),
            ConnectionState::Exhausted => write!(f, "Exhausted"),
            ConnectionState::ShuttingDown => write!(f, "Shutting Down"),
        }
    }
}

/// Manages connection state and the bounded retry budget.
///
/// This is a pure state machine with no I/O; the recorder drives it and
/// sleeps for whatever delay it hands back.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    /// Number of consecutive failed attempts
    failure_count: u32,
    max_attempts: u32,
    backoff_unit: Duration,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_policy(MAX_CONNECT_ATTEMPTS, BACKOFF_UNIT)
    }

    /// Create a manager with a custom budget and backoff unit
    pub fn with_policy(max_attempts: u32, backoff_unit: Duration) -> Self {
        ConnectionManager {
            state: ConnectionState::Disconnected,
            failure_count: 0,
            max_attempts,
            backoff_unit,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check if we should attempt reconnection.
    pub fn should_reconnect(&self) -> bool {
        self.state.should_reconnect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ConnectionState::Exhausted
    }

    /// Backoff owed for the current failure count: 5s, 10s, 15s, ...
    pub fn backoff(&self) -> Duration {
        self.backoff_unit * self.failure_count
    }

    // -------------------------------------------------------------------------
    // State Transitions
    // -------------------------------------------------------------------------

    /// Call this when starting a connection attempt.
    pub fn start_connecting(&mut self) {
        if self.state.should_reconnect() {
            self.state = ConnectionState::Connecting;
        }
    }

    /// A decoded frame proves the link works: the failure count starts over.
    pub fn frame_received(&mut self) {
        if !self.state.is_terminal() {
            self.state = ConnectionState::Streaming;
            self.failure_count = 0;
        }
    }

    /// The server ended the stream without an error.
    ///
    /// Counts against the budget but owes no backoff.
    pub fn closed_cleanly(&mut self) {
        if self.record_failure() {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// A transport error occurred; returns how long to wait before reconnecting.
    pub fn error(&mut self) -> Duration {
        if self.record_failure() {
            self.state = ConnectionState::Backoff;
            self.backoff()
        } else {
            Duration::ZERO
        }
    }

    /// Call this when shutdown is requested. No further connection attempts.
    pub fn shutdown(&mut self) {
        self.state = ConnectionState::ShuttingDown;
    }

    /// Returns false when the failure used up the budget (or we are shutting down)
    fn record_failure(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.failure_count = self.failure_count.saturating_add(1);
        if self.failure_count >= self.max_attempts {
            self.state = ConnectionState::Exhausted;
            return false;
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_transitions() {
        let mut conn = ConnectionManager::new();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.should_reconnect());

        conn.start_connecting();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(!conn.should_reconnect());

        conn.frame_received();
        assert_eq!(conn.state(), ConnectionState::Streaming);

        conn.closed_cleanly();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.failure_count(), 1);
        assert!(conn.should_reconnect());
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let mut conn = ConnectionManager::new();
        conn.start_connecting();
        assert_eq!(conn.error(), Duration::from_secs(5));
        conn.start_connecting();
        assert_eq!(conn.error(), Duration::from_secs(10));
        conn.start_connecting();
        assert_eq!(conn.error(), Duration::from_secs(15));
    }

    #[test]
    fn test_frame_resets_failures() {
        let mut conn = ConnectionManager::new();
        for _ in 0..4 {
            conn.start_connecting();
            conn.closed_cleanly();
        }
        assert_eq!(conn.failure_count(), 4);
        conn.start_connecting();
        conn.frame_received();
        assert_eq!(conn.failure_count(), 0);
        assert!(!conn.is_exhausted());
    }

    #[test]
    fn test_budget_is_exhausted_after_five_failures() {
        let mut conn = ConnectionManager::new();
        let mut attempts = 0;
        while conn.should_reconnect() {
            conn.start_connecting();
            attempts += 1;
            if attempts % 2 == 0 {
                conn.closed_cleanly();
            } else {
                conn.error();
            }
        }
        assert_eq!(attempts, 5);
        assert!(conn.is_exhausted());
        assert_eq!(conn.error(), Duration::ZERO);
        assert_eq!(conn.failure_count(), 5);
    }

    #[test]
    fn test_shutdown_prevents_reconnect() {
        let mut conn = ConnectionManager::new();
        conn.shutdown();
        assert_eq!(conn.state(), ConnectionState::ShuttingDown);

        conn.start_connecting();
        assert_eq!(conn.state(), ConnectionState::ShuttingDown);

        conn.closed_cleanly();
        conn.frame_received();
        assert_eq!(conn.state(), ConnectionState::ShuttingDown);
        assert_eq!(conn.failure_count(), 0);
    }
}
