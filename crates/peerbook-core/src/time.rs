//! Wall-clock timestamps and the injectable clock used for ban expiry.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

/// Clock handed to the registry. Tests pin it; production uses the system clock.
pub type TimeSupplier = Arc<dyn Fn() -> Timestamp + Send + Sync>;

pub fn system_time_supplier() -> TimeSupplier {
    Arc::new(Timestamp::now)
}

/// A supplier that always returns `at`.
pub fn fixed_time_supplier(at: Timestamp) -> TimeSupplier {
    Arc::new(move || at)
}
