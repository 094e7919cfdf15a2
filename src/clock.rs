//! Wall-clock conversions for serialized snapshots.
//!
//! Breaker timing uses `tokio::time::Instant` so tests can pause the clock.
//! Anything leaving the process (JSON status, health reports) is expressed as
//! Unix epoch milliseconds, and durations as whole milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Milliseconds since the Unix epoch for `time`.
pub fn unix_millis(time: SystemTime) -> u64 {
    millis(time.duration_since(UNIX_EPOCH).unwrap_or_default())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    unix_millis(SystemTime::now())
}

/// A monotonic instant paired with the wall-clock time it was taken at.
///
/// Instants are mapped relative to this fixed pair, so one instant always
/// reports the same epoch value, even while the Tokio clock is paused or
/// advanced.
#[derive(Debug, Clone, Copy)]
pub struct ClockAnchor {
    instant: Instant,
    wall: SystemTime,
}

impl ClockAnchor {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: SystemTime::now(),
        }
    }

    /// Epoch milliseconds for `at`.
    pub fn unix_millis(&self, at: Instant) -> u64 {
        let mapped = if at >= self.instant {
            self.wall.checked_add(at - self.instant)
        } else {
            self.wall.checked_sub(self.instant - at)
        };
        mapped.map(unix_millis).unwrap_or(0)
    }
}

impl Default for ClockAnchor {
    fn default() -> Self {
        Self::now()
    }
}

/// Serde adapter: `Duration` as integer milliseconds.
pub mod serde_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::millis(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde adapter: `Option<Duration>` as optional integer milliseconds.
pub mod serde_millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::millis(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Duration in whole milliseconds, saturating.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_millis_epoch() {
        assert_eq!(unix_millis(UNIX_EPOCH), 0);
        assert_eq!(unix_millis(UNIX_EPOCH + Duration::from_millis(1500)), 1500);
    }

    #[tokio::test]
    async fn test_instant_mapping_is_ordered() {
        let anchor = ClockAnchor::now();
        let now = Instant::now();
        let a = anchor.unix_millis(now);
        let b = anchor.unix_millis(now + Duration::from_secs(30));
        assert_eq!(b - a, 30_000);
        assert_eq!(anchor.unix_millis(now - Duration::from_secs(5)), a - 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mapping_stable_while_clock_advances() {
        let anchor = ClockAnchor::now();
        let at = Instant::now() + Duration::from_millis(1000);
        let before = anchor.unix_millis(at);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(anchor.unix_millis(at), before);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1234)), 1234);
        assert_eq!(millis(Duration::MAX), u64::MAX);

        let json = serde_json::to_string(&Wrapper(Duration::MAX)).unwrap();
        assert_eq!(json, u64::MAX.to_string());
    }

    #[derive(serde::Serialize)]
    struct Wrapper(#[serde(with = "serde_millis")] Duration);
}
