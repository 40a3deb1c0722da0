//! Human-readable order codes and invoice numbers.

use std::sync::Arc;
use std::time::Duration;

use domain::{
    INVOICE_SEQUENCE, ORDER_SEQUENCE, SequenceValue, invoice_bucket, order_bucket,
};
use rand::Rng;
use store::{CommerceStore, StoreError};

use crate::clock::{Clock, business_day};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, Result};

/// Upper bound of the random pause between lock attempts.
const MAX_RETRY_JITTER_MS: u64 = 50;

/// Hands out collision-free, day-bucketed sequence values.
///
/// Each attempt waits at most `sequence_lock_timeout` for the sequence lock;
/// after `sequence_attempts` failed attempts the call fails with
/// `SequenceExhausted`. A value is never produced without the lock.
pub struct SequenceGenerator<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: CheckoutConfig,
}

impl<S> SequenceGenerator<S>
where
    S: CommerceStore + Clone,
{
    pub fn new(store: S, clock: Arc<dyn Clock>, config: CheckoutConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns the next value of `name` within `bucket`.
    #[tracing::instrument(skip(self))]
    pub async fn next_value(&self, name: &str, bucket: &str) -> Result<SequenceValue> {
        let attempts = self.config.sequence_attempts.max(1);

        for attempt in 1..=attempts {
            match self
                .store
                .next_sequence_value(name, bucket, self.config.sequence_lock_timeout)
                .await
            {
                Ok(value) => return Ok(value),
                Err(StoreError::LockTimeout { .. }) => {
                    metrics::counter!("sequence_lock_retries_total", "sequence" => name.to_string())
                        .increment(1);
                    tracing::warn!(attempt, attempts, "Sequence lock busy");
                    if attempt < attempts {
                        let jitter = rand::thread_rng().gen_range(0..=MAX_RETRY_JITTER_MS);
                        tokio::time::sleep(Duration::from_millis(jitter)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CheckoutError::SequenceExhausted {
            sequence: name.to_string(),
            attempts,
        })
    }

    /// Next order code for the current business day, e.g. `202610180007`.
    pub async fn next_order_code(&self) -> Result<String> {
        let day = business_day(self.clock.now(), self.config.business_offset);
        let value = self.next_value(ORDER_SEQUENCE, &order_bucket(day)).await?;
        Ok(value.order_code())
    }

    /// Next invoice number for the current business day, e.g. `INV-2026/10/18/101`.
    pub async fn next_invoice_number(&self) -> Result<String> {
        let day = business_day(self.clock.now(), self.config.business_offset);
        let value = self
            .next_value(INVOICE_SEQUENCE, &invoice_bucket(day))
            .await?;
        Ok(value.invoice_number())
    }
}
