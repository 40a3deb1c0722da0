//! Checkout configuration.

use std::time::Duration as StdDuration;

use chrono::{Duration, FixedOffset, Offset, Utc};
use domain::PricingPolicy;

/// Default business time zone offset (UTC+05:30).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Windows used by the timeout sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Pending payments older than this move to `processing`.
    pub processing_after: Duration,
    /// Open payments at least this old are failed and their order cancelled.
    pub fail_after: Duration,
    /// How often the periodic task runs.
    pub interval: StdDuration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            processing_after: Duration::minutes(5),
            fail_after: Duration::minutes(9),
            interval: StdDuration::from_secs(60),
        }
    }
}

/// Settings shared by the checkout components.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub pricing: PricingPolicy,
    pub sweep: SweepPolicy,
    /// ISO currency code for payments, e.g. `INR`.
    pub currency: String,
    /// Bounded wait for one attempt at the sequence lock.
    pub sequence_lock_timeout: StdDuration,
    /// Total attempts at the sequence lock before giving up.
    pub sequence_attempts: u32,
    /// Offset of the business time zone; day buckets use its calendar.
    pub business_offset: FixedOffset,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            sweep: SweepPolicy::default(),
            currency: "INR".to_string(),
            sequence_lock_timeout: StdDuration::from_secs(2),
            sequence_attempts: 3,
            business_offset: offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES),
        }
    }
}

/// Builds a fixed offset from minutes east of UTC, falling back to UTC when
/// the value is out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}
