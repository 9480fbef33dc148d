//! Replay clock.
//!
//! Maps wall-clock time since playback started onto the recording's
//! timeline. The replay loop polls [`ReplayClock::is_due`] every
//! [`POLL_INTERVAL`] instead of sleeping for exact durations, so output
//! jitter is bounded by the poll interval.

use std::time::Duration;

use crate::error::InvalidSpeed;

/// How often the replay loop re-checks the head of the recording
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Position on the recording timeline reached after `elapsed` wall time
pub fn due_position(elapsed: Duration, speed: f64) -> f64 {
    elapsed.as_secs_f64() * speed
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayClock {
    speed: f64,
}

impl Default for ReplayClock {
    fn default() -> Self {
        ReplayClock { speed: 1.0 }
    }
}

impl ReplayClock {
    pub fn new(speed: f64) -> Result<Self, InvalidSpeed> {
        if speed.is_finite() && speed > 0.0 {
            Ok(ReplayClock { speed })
        } else {
            Err(InvalidSpeed(speed))
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn position(&self, elapsed: Duration) -> f64 {
        due_position(elapsed, self.speed)
    }

    /// An entry is due once the scaled elapsed time has reached its offset
    pub fn is_due(&self, elapsed: Duration, offset: f64) -> bool {
        self.position(elapsed) >= offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_position_scales_elapsed() {
        assert_eq!(due_position(Duration::from_secs(3), 2.0), 6.0);
        assert_eq!(due_position(Duration::from_millis(500), 1.0), 0.5);
    }

    #[test]
    fn test_is_due() {
        let clock = ReplayClock::new(2.0).unwrap();
        assert!(clock.is_due(Duration::ZERO, 0.0));
        assert!(!clock.is_due(Duration::from_millis(999), 2.0));
        assert!(clock.is_due(Duration::from_secs(1), 2.0));
    }

    #[test]
    fn test_rejects_bad_speeds() {
        assert_eq!(ReplayClock::new(0.0), Err(InvalidSpeed(0.0)));
        assert!(ReplayClock::new(-1.0).is_err());
        assert!(ReplayClock::new(f64::NAN).is_err());
        assert!(ReplayClock::new(f64::INFINITY).is_err());
        assert_eq!(ReplayClock::default().speed(), 1.0);
    }
}
