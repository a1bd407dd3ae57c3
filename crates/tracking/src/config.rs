use std::env;
use std::time::Duration;

use platform::WatchOptions;

/// Tracking session tuning, read from the host environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Upper bound on every backend and routing call.
    pub request_timeout: Duration,
    pub sample_interval: Duration,
    pub sample_distance_m: f64,

    /// Origin drift below which a route is not recomputed.
    pub route_epsilon_m: f64,
    pub publish_interval: Duration,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            request_timeout: Duration::from_secs(env_u64("TRACKING_REQUEST_TIMEOUT_SECS", 8)),
            sample_interval: Duration::from_millis(env_u64("TRACKING_SAMPLE_INTERVAL_MS", 5_000)),
            sample_distance_m: env_f64("TRACKING_SAMPLE_DISTANCE_M", 10.0),
            route_epsilon_m: env_f64("TRACKING_ROUTE_EPSILON_M", 25.0),
            publish_interval: Duration::from_millis(env_u64("TRACKING_PUBLISH_INTERVAL_MS", 3_000)),
        }
    }

    #[must_use]
    pub const fn watch_options(&self) -> WatchOptions {
        WatchOptions { min_interval: self.sample_interval, min_distance_m: self.sample_distance_m }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|value| value.parse::<f64>().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse::<u64>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_env();
        assert_eq!(config.request_timeout, Duration::from_secs(8));
        assert_eq!(config.watch_options().min_interval, Duration::from_secs(5));
        assert!(config.route_epsilon_m > config.sample_distance_m);
    }
}
