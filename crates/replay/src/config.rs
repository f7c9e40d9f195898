use serde::{Deserialize, Deserializer};
use std::time::Duration;

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Playback settings. Durations are written in milliseconds:
///
/// ```toml
/// speed = 2.0
/// skip_inactive = true
/// inactive_threshold = 5000
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayerConfig {
    pub speed: f64,
    /// Fast-forward through gaps between user interactions.
    pub skip_inactive: bool,
    /// Shortest gap treated as inactivity.
    #[serde(deserialize_with = "millis")]
    pub inactive_threshold: Duration,
    /// While skipping, every this much session time plays in one unit of
    /// playback speed.
    #[serde(deserialize_with = "millis")]
    pub skip_interval: Duration,
    pub max_speed: f64,
    /// Keep the scheduler running when it runs out of events, waiting for
    /// [`add_event`](crate::Replayer::add_event).
    pub live_mode: bool,
    /// How long an add may wait for its parent or sibling before it is
    /// abandoned.
    #[serde(deserialize_with = "millis")]
    pub pending_add_timeout: Duration,
    /// Expected interval between [`tick`](crate::Replayer::tick) calls.
    #[serde(deserialize_with = "millis")]
    pub tick_interval: Duration,
    /// Patch the visible tree in place on seek and checkout instead of
    /// rebuilding it.
    pub reconcile_checkpoints: bool,
}

impl Default for ReplayerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            skip_inactive: false,
            inactive_threshold: Duration::from_secs(10),
            skip_interval: Duration::from_secs(5),
            max_speed: 360.0,
            live_mode: false,
            pending_add_timeout: Duration::from_millis(500),
            tick_interval: Duration::from_millis(16),
            reconcile_checkpoints: false,
        }
    }
}

impl ReplayerConfig {
    /// Playback speed used to cross an inactive gap of `gap`.
    pub fn skip_speed(&self, gap: Duration) -> f64 {
        let interval = self.skip_interval.as_secs_f64();
        if interval <= 0.0 {
            return self.max_speed;
        }
        (gap.as_secs_f64() / interval).round().clamp(1.0, self.max_speed.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ReplayerConfig = toml::from_str(
            r#"
            speed = 2.0
            skip_inactive = true
            pending_add_timeout = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.speed, 2.0);
        assert!(config.skip_inactive);
        assert_eq!(config.pending_add_timeout, Duration::from_millis(1500));
        assert_eq!(config.inactive_threshold, Duration::from_secs(10));
        assert_eq!(config.max_speed, 360.0);
    }

    #[test]
    fn skip_speed_is_capped() {
        let config = ReplayerConfig::default();
        assert_eq!(config.skip_speed(Duration::from_secs(60)), 12.0);
        assert_eq!(config.skip_speed(Duration::from_secs(3600 * 24)), 360.0);
        assert_eq!(config.skip_speed(Duration::from_secs(1)), 1.0);
    }
}
