//! Store configuration.
//!
//! Everything the store needs is carried in this explicit value rather than
//! read from process-wide state, so several store instances (per region, per
//! tenant) can coexist in one process.

use chrono::Duration;

use crate::policy::DEFAULT_GRACE_PERIOD_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Logical table (or namespace) the adapter should address.
    pub table: String,
    /// Default grace period for snapshot decisions; individual `update`
    /// calls may override it.
    pub grace_period: Duration,
    /// Retry budget handed through to the backing-store client. The store
    /// itself never retries.
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: "dmp-records".to_string(),
            grace_period: Duration::milliseconds(DEFAULT_GRACE_PERIOD_MS),
            max_attempts: 3,
        }
    }
}

impl StoreConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.table, "dmp-records");
        assert_eq!(config.grace_period, Duration::hours(2));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn builders_override_defaults() {
        let config = StoreConfig::new("tenant-a")
            .with_grace_period(Duration::minutes(10))
            .with_max_attempts(1);
        assert_eq!(config.table, "tenant-a");
        assert_eq!(config.grace_period, Duration::minutes(10));
        assert_eq!(config.max_attempts, 1);
    }
}
