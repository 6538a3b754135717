//! Resale limits.

use chrono::{DateTime, Duration, Utc};

/// Hours a buyer must wait after original issuance before reselling
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Resales allowed after original issuance
pub const DEFAULT_MAX_RESALES: u8 = 2;

/// Time and count limits applied to resales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResalePolicy {
    /// Waiting period measured from original issuance
    pub cooldown: Duration,
    /// Maximum number of completed resales per ticket
    pub max_resales: u8,
}

impl ResalePolicy {
    /// Creates a policy
    #[must_use]
    pub const fn new(cooldown: Duration, max_resales: u8) -> Self {
        Self {
            cooldown,
            max_resales,
        }
    }

    /// Earliest time a ticket issued at `purchase_time` may be offered for resale
    ///
    /// The anchor is the original issuance; later resales do not restart it.
    #[must_use]
    pub fn resale_opens_at(&self, purchase_time: DateTime<Utc>) -> DateTime<Utc> {
        purchase_time
            .checked_add_signed(self.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for ResalePolicy {
    fn default() -> Self {
        Self::new(
            Duration::hours(DEFAULT_COOLDOWN_HOURS),
            DEFAULT_MAX_RESALES,
        )
    }
}
