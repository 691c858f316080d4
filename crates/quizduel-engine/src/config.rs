//! Engine configuration and per-duel match settings.

use std::time::Duration;

use quizduel_protocol::TopicId;

/// Smallest number of rounds a duel may request.
pub const MIN_ROUNDS: u32 = 1;
/// Largest number of rounds a duel may request.
pub const MAX_ROUNDS: u32 = 10;
/// Shortest allowed match duration.
pub const MIN_DURATION_SECS: u64 = 60;
/// Longest allowed match duration.
pub const MAX_DURATION_SECS: u64 = 1800;

/// Process-wide engine settings.
///
/// The tick intervals exist so tests can run a full duel in milliseconds;
/// production keeps the one-second cadence.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wrong answers a player may spend per round before it closes.
    pub attempt_cap: u32,
    /// Rounds used when a request doesn't ask for a specific count.
    pub default_rounds: u32,
    /// Match duration used when a request doesn't ask for one.
    pub default_duration_secs: u64,
    /// Rating assumed for players the rating store doesn't know yet.
    pub default_rating: i32,
    /// First value of the pre-game countdown (counts down to 1).
    pub countdown_from: u32,
    /// Delay between countdown ticks.
    pub countdown_interval: Duration,
    /// Delay between match-clock ticks; each tick burns one second of the
    /// time budget.
    pub clock_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attempt_cap: 3,
            default_rounds: 5,
            default_duration_secs: 60,
            default_rating: 1000,
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
            clock_interval: Duration::from_secs(1),
        }
    }
}

/// What one player asked for, normalized into a valid duel setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSettings {
    /// Restrict content to one topic; `None` accepts anything.
    pub topic: Option<TopicId>,
    /// Number of rounds, already clamped to `[MIN_ROUNDS, MAX_ROUNDS]`.
    pub rounds: u32,
    /// Time budget in seconds, clamped to `[MIN_DURATION_SECS, MAX_DURATION_SECS]`.
    pub duration_secs: u64,
}

impl MatchSettings {
    /// Builds settings from a raw client request, filling defaults and
    /// clamping out-of-range values.
    pub fn from_request(
        config: &EngineConfig,
        topic: Option<TopicId>,
        rounds: Option<u32>,
        duration_secs: Option<u64>,
    ) -> Self {
        Self {
            topic,
            rounds: rounds
                .unwrap_or(config.default_rounds)
                .clamp(MIN_ROUNDS, MAX_ROUNDS),
            duration_secs: duration_secs
                .unwrap_or(config.default_duration_secs)
                .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS),
        }
    }

    /// Two queue entries can be paired when they agree on the topic or at
    /// least one of them doesn't care.
    pub fn compatible(&self, other: &Self) -> bool {
        self.topic.is_none() || other.topic.is_none() || self.topic == other.topic
    }

    /// The settings a paired duel actually runs with: the more restrictive
    /// of the two requests, and whichever topic filter is present.
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            topic: self.topic.or(other.topic),
            rounds: self.rounds.min(other.rounds),
            duration_secs: self.duration_secs.min(other.duration_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(topic: Option<u32>, rounds: u32, duration: u64) -> MatchSettings {
        MatchSettings {
            topic: topic.map(TopicId),
            rounds,
            duration_secs: duration,
        }
    }

    #[test]
    fn test_from_request_fills_defaults() {
        let config = EngineConfig::default();
        let s = MatchSettings::from_request(&config, None, None, None);
        assert_eq!(s.rounds, 5);
        assert_eq!(s.duration_secs, 60);
        assert_eq!(s.topic, None);
    }

    #[test]
    fn test_from_request_clamps_out_of_range_values() {
        let config = EngineConfig::default();
        let s = MatchSettings::from_request(&config, None, Some(99), Some(5));
        assert_eq!(s.rounds, MAX_ROUNDS);
        assert_eq!(s.duration_secs, MIN_DURATION_SECS);

        let s = MatchSettings::from_request(&config, None, Some(0), Some(1_000_000));
        assert_eq!(s.rounds, MIN_ROUNDS);
        assert_eq!(s.duration_secs, MAX_DURATION_SECS);
    }

    #[test]
    fn test_compatible_requires_topic_agreement() {
        assert!(settings(None, 5, 60).compatible(&settings(None, 5, 60)));
        assert!(settings(Some(1), 5, 60).compatible(&settings(None, 5, 60)));
        assert!(settings(None, 5, 60).compatible(&settings(Some(2), 5, 60)));
        assert!(settings(Some(2), 5, 60).compatible(&settings(Some(2), 5, 60)));
        assert!(!settings(Some(1), 5, 60).compatible(&settings(Some(2), 5, 60)));
    }

    #[test]
    fn test_merged_takes_more_restrictive_settings() {
        let merged = settings(None, 8, 300).merged(&settings(Some(4), 3, 600));
        assert_eq!(merged.rounds, 3);
        assert_eq!(merged.duration_secs, 300);
        assert_eq!(merged.topic, Some(TopicId(4)));
    }
}
