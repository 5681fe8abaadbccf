//! Time utilities for the tick engine and heartbeat

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation rate. One tick is one physics step.
pub const SIMULATION_TPS: u32 = 60;
/// Default heartbeat period
pub const HEARTBEAT_INTERVAL_MS: u64 = 2_000;
/// Missed heartbeat periods tolerated before a participant is dropped
pub const HEARTBEAT_TIMEOUT_MULTIPLE: u32 = 3;
/// Default render-time offset announced to renderers at `init`
pub const LAG_COMP_MS: u64 = 100;

/// Fixed period for a given tick rate
pub fn tick_period(tps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tps.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_for_default_rate() {
        assert_eq!(tick_period(SIMULATION_TPS), Duration::from_micros(16_666));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        assert_eq!(tick_period(0), Duration::from_secs(1));
    }
}
