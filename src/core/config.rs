//! # Orchestrator configuration.
//!
//! [`Config`] centralizes the timing and sizing knobs of the lifecycle
//! controller. It is plain data: build it in code, or load it from the
//! `[orchestrator]` table of a settings file (durations in milliseconds).
//!
//! ## Sentinel values
//! - `tick_interval = 0` → no periodic tick
//! - `bus_capacity`, `actor_queue_capacity` → clamped to at least 1
//! - `grace = 0` → force-kill immediately after the interrupt

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::key::StreamKey;

/// How stream keys are derived from relay notifications.
///
/// Exactly one policy is active; they are never mixed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Key = last non-empty segment of the stream path (`/live/cam1` → `cam1`).
    #[default]
    Honor,
    /// Every stream maps onto one configured key.
    Fixed { key: StreamKey },
}

/// Runtime configuration for the lifecycle controller and router.
///
/// ## Field semantics
/// - `grace`: wait after SIGINT before force-killing a renderer
/// - `settle_delay`: delay between a stream-begin notification and the start
/// - `debounce`: quiet window for coalesced restarts
/// - `tick_interval`: period of the demo auto-update (`0` = disabled)
/// - `bus_capacity`: event ring buffer size
/// - `actor_queue_capacity`: pending commands per key before `submit` waits
/// - `key_policy`: see [`KeyPolicy`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "grace_ms", with = "millis")]
    pub grace: Duration,
    #[serde(rename = "settle_delay_ms", with = "millis")]
    pub settle_delay: Duration,
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,
    #[serde(rename = "tick_interval_ms", with = "millis")]
    pub tick_interval: Duration,
    pub bus_capacity: usize,
    pub actor_queue_capacity: usize,
    pub key_policy: KeyPolicy,
}

impl Config {
    /// Returns the tick period, `None` when disabled.
    #[inline]
    pub fn tick(&self) -> Option<Duration> {
        if self.tick_interval.is_zero() {
            None
        } else {
            Some(self.tick_interval)
        }
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn actor_queue_clamped(&self) -> usize {
        self.actor_queue_capacity.max(1)
    }
}

impl Default for Config {
    /// - `grace = 1s`
    /// - `settle_delay = 2s` (relay needs a moment before the stream is readable)
    /// - `debounce = 2s`
    /// - `tick_interval = 30s`
    /// - `bus_capacity = 1024`, `actor_queue_capacity = 64`
    /// - `key_policy = Honor`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            debounce: Duration::from_secs(2),
            tick_interval: Duration::from_secs(30),
            bus_capacity: 1024,
            actor_queue_capacity: 64,
            key_policy: KeyPolicy::Honor,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tick_disables_ticker() {
        let cfg = Config {
            tick_interval: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.tick(), None);
        assert_eq!(Config::default().tick(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn capacities_are_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            actor_queue_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.actor_queue_clamped(), 1);
    }

    #[test]
    fn parses_millis_and_fixed_policy() {
        let cfg: Config = toml::from_str(
            r#"
            grace_ms = 500
            debounce_ms = 250
            key_policy = { mode = "fixed", key = "test" }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.grace, Duration::from_millis(500));
        assert_eq!(cfg.debounce, Duration::from_millis(250));
        assert_eq!(cfg.settle_delay, Duration::from_secs(2));
        assert_eq!(
            cfg.key_policy,
            KeyPolicy::Fixed {
                key: StreamKey::new("test").unwrap()
            }
        );
    }
}
