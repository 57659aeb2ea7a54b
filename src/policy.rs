//! Snapshot policy for updates.

use chrono::{DateTime, Duration, Utc};

use crate::document::Document;

/// Default grace period before an update must snapshot the current latest:
/// 2 hours.
pub const DEFAULT_GRACE_PERIOD_MS: i64 = 7_200_000;

/// Decides whether an update may overwrite `latest` in place or must first
/// capture it as an immutable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPolicy {
    grace_period: Duration,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::milliseconds(DEFAULT_GRACE_PERIOD_MS),
        }
    }
}

impl SnapshotPolicy {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// True when the stored latest must be snapshotted before being
    /// overwritten: the writing system changed, or the latest has been
    /// stable for longer than the grace period.
    ///
    /// Collision and staleness checks are the caller's concern, not this
    /// policy's.
    pub fn must_snapshot(
        &self,
        current: &Document,
        incoming: &Document,
        now: DateTime<Utc>,
    ) -> bool {
        if incoming.provenance() != current.provenance() {
            return true;
        }
        match current.modified() {
            Some(modified) => now - modified > self.grace_period,
            // Missing or unparseable modified on the stored latest: snapshot
            // rather than silently discard history.
            None => true,
        }
    }
}
