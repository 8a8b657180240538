//! Configuration loading and representation.

use tracing::warn;

use stockroom_events::DEFAULT_MAX_IN_FLIGHT;

/// Env var bounding concurrently executing event handlers.
pub const MAX_IN_FLIGHT_ENV: &str = "STOCKROOM_BUS_MAX_IN_FLIGHT";
/// Env var holding the tracing filter directives.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum handler tasks executing at once (minimum 1).
    pub max_in_flight: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockroomConfig {
    pub bus: BusConfig,
    pub log_filter: String,
}

impl Default for StockroomConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl StockroomConfig {
    /// Load from the process environment; missing or malformed values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (the environment, a map in tests, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(MAX_IN_FLIGHT_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => config.bus.max_in_flight = n,
                _ => warn!(
                    key = MAX_IN_FLIGHT_ENV,
                    value = %raw,
                    default = config.bus.max_in_flight,
                    "invalid value; using default"
                ),
            }
        }

        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        config
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.bus.max_in_flight = max.max(1);
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Install the JSON tracing subscriber with `log_filter` (no-op if one is already set).
    pub fn init_tracing(&self) {
        stockroom_observability::tracing::init_with_filter(&self.log_filter);
    }
}
