//! Periodic cancellation of prepaid payments that were never reconciled.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::{
    DeliveryStatus, Payment, PaymentLog, PaymentLogStatus, PaymentStatus, PaymentTransition,
    ShippingStatus, TransitionOutcome,
};
use serde::Serialize;
use store::{CommerceStore, StalePaymentQuery, StoreError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::config::SweepPolicy;
use crate::error::Result;

/// Counts of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub marked_processing: usize,
    pub auto_cancelled: usize,
    /// Payments another writer reached first.
    pub skipped: usize,
}

/// Advances stale prepaid payments: `pending` to `processing` after the
/// first window, and any open payment to `failed` after the second, which
/// also cancels the order and shipment.
///
/// Every write is a compare-and-swap on the payment status, so a sweep can
/// overlap another sweep or a callback without double-applying.
pub struct TimeoutSweeper<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
}

impl<S> TimeoutSweeper<S>
where
    S: CommerceStore + 'static,
{
    pub fn new(store: S, clock: Arc<dyn Clock>, policy: SweepPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Runs one pass as of `now`.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        metrics::counter!("sweeper_runs_total").increment(1);
        let mut report = SweepReport::default();

        let fail_cutoff = now - self.policy.fail_after;
        let expired = self
            .store
            .find_stale_payments(
                StalePaymentQuery::prepaid(PaymentStatus::OPEN).created_at_or_before(fail_cutoff),
            )
            .await?;

        for payment in expired {
            let transition = PaymentTransition::to(payment.id, PaymentStatus::Failed, now)
                .cascade_delivery(DeliveryStatus::Cancelled)
                .cascade_shipping(ShippingStatus::Cancelled)
                .with_log(
                    PaymentLog::new(PaymentLogStatus::AutoCancelled, now)
                        .for_payment(&payment)
                        .with_response(format!(
                            "no callback within {} minutes",
                            self.policy.fail_after.num_minutes()
                        )),
                );
            if self.try_transition(&payment, transition).await? {
                report.auto_cancelled += 1;
            } else {
                report.skipped += 1;
            }
        }

        let processing_cutoff = now - self.policy.processing_after;
        let waiting = self
            .store
            .find_stale_payments(
                StalePaymentQuery::prepaid([PaymentStatus::Pending])
                    .created_after(fail_cutoff)
                    .created_at_or_before(processing_cutoff),
            )
            .await?;

        for payment in waiting {
            let transition = PaymentTransition::to(payment.id, PaymentStatus::Processing, now);
            if self.try_transition(&payment, transition).await? {
                report.marked_processing += 1;
            } else {
                report.skipped += 1;
            }
        }

        metrics::counter!("sweeper_auto_cancelled_total").increment(report.auto_cancelled as u64);
        if report != SweepReport::default() {
            tracing::info!(
                marked_processing = report.marked_processing,
                auto_cancelled = report.auto_cancelled,
                skipped = report.skipped,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    async fn try_transition(&self, payment: &Payment, transition: PaymentTransition) -> Result<bool> {
        match self.store.transition_payment(transition).await {
            Ok(TransitionOutcome::Applied(_)) => Ok(true),
            Ok(TransitionOutcome::Rejected { current }) => {
                tracing::debug!(payment_id = %payment.id, %current, "Payment moved on before sweep");
                Ok(false)
            }
            // Deleted by an admin between the query and the write
            Err(StoreError::PaymentNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs the sweep every `policy.interval` until `shutdown` flips to true
    /// or its sender is dropped. A failed pass is logged and retried on the
    /// next tick.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.policy.interval.as_secs(), "Timeout sweeper started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep_once(self.clock.now()).await {
                            tracing::error!(error = %e, "Sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Timeout sweeper stopped");
        })
    }
}
