//! Heartbeat policy: when to ping, and what to send.
//!
//! Only supplies numbers and payload data. The scheduler that actually sends
//! pings lives in `mah-delivery`.

use std::time::Duration;

use mah_core::{ConfigError, Destinations};

use crate::schema::{ExtraMap, HeartBeat};

/// Timing for heartbeat pings: first after `delay_ms`, then every `period_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub delay_ms: u64,
    pub period_ms: u64,
}

impl Schedule {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Static augmentation merged into each outgoing ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPayload<'a> {
    pub extra_body: &'a ExtraMap,
    pub extra_headers: &'a ExtraMap,
    pub destinations: &'a Destinations,
}

impl HeartBeat {
    pub fn is_enabled(&self) -> bool {
        self.enable
    }

    /// Delay and period as configured.
    ///
    /// Fails when the heartbeat is enabled and `period <= 0` or `delay < 0`.
    /// A disabled heartbeat never fails; negative values are clamped to zero.
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        if self.enable {
            check_timing(self.delay, self.period)?;
        }
        Ok(Schedule {
            delay_ms: u64::try_from(self.delay).unwrap_or(0),
            period_ms: u64::try_from(self.period).unwrap_or(0),
        })
    }

    pub fn payload(&self) -> HeartbeatPayload<'_> {
        HeartbeatPayload {
            extra_body: &self.extra_body,
            extra_headers: &self.extra_headers,
            destinations: &self.destinations,
        }
    }
}

pub(crate) fn check_timing(delay: i64, period: i64) -> Result<(), ConfigError> {
    if period <= 0 {
        return Err(ConfigError::validation(
            "heartbeat.period",
            format!("must be > 0 while heartbeat is enabled (got {period})"),
        ));
    }
    if delay < 0 {
        return Err(ConfigError::validation(
            "heartbeat.delay",
            format!("must be >= 0 while heartbeat is enabled (got {delay})"),
        ));
    }
    Ok(())
}
