use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{CallbackEvent, CallbackOutcome, OrderStatusType, PaymentTransaction, TransactionStatus, AMOUNT_MISMATCH},
    events::{EventProducers, PaymentCompletedEvent, PaymentFailedEvent, PaymentTimedOutEvent},
    mpe_api::errors::ReconcileError,
    traits::PaymentStore,
};

/// How long to wait before re-checking the store when a callback references an unknown transaction. The gateway
/// can fire its callback before the initiator's insert has committed; one short grace read covers that race.
const ORPHAN_GRACE: std::time::Duration = std::time::Duration::from_millis(500);

/// The result of applying a callback to the store.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// This callback settled the transaction. Fired events and the order update (if any) have been handled.
    Reconciled(PaymentTransaction),
    /// The transaction was already in a terminal state, or a concurrent applier won the conditional write.
    /// Nothing was changed; the caller should still acknowledge the callback.
    AlreadyReconciled,
    /// No transaction matches the callback's gateway reference. The payload has been recorded for support
    /// follow-up; the caller should still acknowledge the callback.
    Orphan,
}

/// `ReconciliationApi` is the single writer of transaction outcomes. Every inbound callback, no matter which
/// endpoint it arrived on, is normalized to a [`CallbackEvent`] and funnelled through [`Self::apply`]; the timeout
/// sweep runs through [`Self::sweep_stale`]. Both paths settle a transaction with one conditional write, so
/// duplicated and racing deliveries collapse to exactly one effect.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentStore
{
    /// Apply a gateway callback to the store.
    ///
    /// The decision ladder:
    /// 1. An unknown gateway reference (after one grace read) is recorded as an orphan.
    /// 2. A transaction already in a terminal state is left untouched; the callback is a duplicate.
    /// 3. Otherwise the callback's outcome is mapped to a target status and written with a compare-and-swap.
    ///    A success whose confirmed amount does not match the initiated amount settles as `Failed` with
    ///    [`AMOUNT_MISMATCH`]; the money was moved but the order must not be fulfilled automatically.
    /// 4. Only the write that wins the compare-and-swap updates the order and emits an event. Losers report
    ///    [`ApplyOutcome::AlreadyReconciled`].
    pub async fn apply(&self, event: CallbackEvent) -> Result<ApplyOutcome, ReconcileError> {
        let gateway_reference = event.gateway_reference.clone();
        let mut transaction = self.db.fetch_transaction_by_reference(&gateway_reference).await?;
        if transaction.is_none() {
            tokio::time::sleep(ORPHAN_GRACE).await;
            transaction = self.db.fetch_transaction_by_reference(&gateway_reference).await?;
        }
        let Some(transaction) = transaction else {
            warn!("🔄️ Callback [{gateway_reference}] matches no transaction. Recording it as an orphan.");
            self.db.record_orphan_callback(&event).await?;
            return Ok(ApplyOutcome::Orphan);
        };
        if transaction.status.is_terminal() {
            if transaction.status == TransactionStatus::Completed {
                self.repair_order_if_unpaid(&transaction).await?;
            }
            debug!(
                "🔄️ Callback [{gateway_reference}] is a duplicate. Transaction #{} is already {}.",
                transaction.id, transaction.status
            );
            return Ok(ApplyOutcome::AlreadyReconciled);
        }
        let (new_status, failure_reason) = settle_outcome(&event, &transaction);
        let digest = event.digest();
        let updated =
            self.db.update_status_if_initiated(transaction.id, new_status, failure_reason.clone(), &digest).await?;
        let Some(updated) = updated else {
            debug!(
                "🔄️ Lost the settlement race for transaction #{}: another applier got there first.",
                transaction.id
            );
            return Ok(ApplyOutcome::AlreadyReconciled);
        };
        match updated.status {
            TransactionStatus::Completed => {
                let order = self.db.mark_order_paid(&updated.order_id).await?;
                info!(
                    "🔄️ Payment of {} for order {} completed. Transaction #{}. Order is now {}.",
                    updated.amount, updated.order_id, updated.id, order.status
                );
                self.call_payment_completed_hook(&updated).await;
            },
            TransactionStatus::Failed => {
                let reason = updated.failure_reason.clone().unwrap_or_else(|| "Unspecified".to_string());
                info!(
                    "🔄️ Payment for order {} failed. Transaction #{}. Reason: {reason}",
                    updated.order_id, updated.id
                );
                self.call_payment_failed_hook(&updated, reason).await;
            },
            // The CAS only writes terminal statuses, and TimedOut is the sweep's alone.
            _ => error!("🔄️ Transaction #{} settled into unexpected status {}", updated.id, updated.status),
        }
        Ok(ApplyOutcome::Reconciled(updated))
    }

    /// Transition every transaction stuck in `Initiated` for longer than `older_than` to `TimedOut`, emitting one
    /// timeout event per swept transaction. The conditional sweep guarantees a transaction is swept at most once,
    /// so overlapping sweeps cannot double-fire events.
    pub async fn sweep_stale(&self, older_than: Duration) -> Result<Vec<PaymentTransaction>, ReconcileError> {
        let swept = self.db.sweep_stale_transactions(older_than).await?;
        if swept.is_empty() {
            trace!("🕰️ Timeout sweep found nothing to do");
            return Ok(swept);
        }
        info!("🕰️ Timeout sweep moved {} transaction(s) to TimedOut", swept.len());
        for transaction in &swept {
            debug!("🕰️ Transaction #{} for order {} timed out", transaction.id, transaction.order_id);
            self.call_payment_timed_out_hook(transaction).await;
        }
        Ok(swept)
    }

    /// A crash or transient store error between the status write and the order update leaves a `Completed`
    /// transaction against a `Pending` order. The gateway's redelivery of the callback is the repair opportunity:
    /// finish the order update (and the event) before acknowledging the duplicate.
    async fn repair_order_if_unpaid(&self, transaction: &PaymentTransaction) -> Result<(), ReconcileError> {
        let Some(order) = self.db.fetch_order(&transaction.order_id).await? else {
            return Ok(());
        };
        if order.status == OrderStatusType::Paid {
            return Ok(());
        }
        warn!(
            "🔄️ Transaction #{} is Completed but order {} was still {}. Completing the order update now.",
            transaction.id, transaction.order_id, order.status
        );
        self.db.mark_order_paid(&transaction.order_id).await?;
        self.call_payment_completed_hook(transaction).await;
        Ok(())
    }

    async fn call_payment_completed_hook(&self, transaction: &PaymentTransaction) {
        for emitter in &self.producers.payment_completed_producer {
            trace!("🔄️ Notifying payment completed hook subscribers");
            let event = PaymentCompletedEvent {
                order_id: transaction.order_id.clone(),
                amount: transaction.amount,
                transaction_id: transaction.id,
            };
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_failed_hook(&self, transaction: &PaymentTransaction, reason: String) {
        for emitter in &self.producers.payment_failed_producer {
            trace!("🔄️ Notifying payment failed hook subscribers");
            let event = PaymentFailedEvent {
                order_id: transaction.order_id.clone(),
                transaction_id: transaction.id,
                reason: reason.clone(),
            };
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_timed_out_hook(&self, transaction: &PaymentTransaction) {
        for emitter in &self.producers.payment_timed_out_producer {
            trace!("🕰️ Notifying payment timed out hook subscribers");
            let event =
                PaymentTimedOutEvent { order_id: transaction.order_id.clone(), transaction_id: transaction.id };
            emitter.publish_event(event).await;
        }
    }
}

/// Map a callback outcome onto the status the transaction should settle into.
fn settle_outcome(event: &CallbackEvent, transaction: &PaymentTransaction) -> (TransactionStatus, Option<String>) {
    match event.outcome {
        CallbackOutcome::Success => match event.amount_confirmed {
            Some(confirmed) if confirmed == transaction.amount => (TransactionStatus::Completed, None),
            Some(confirmed) => {
                warn!(
                    "🔄️ Transaction #{} confirmed {confirmed} but {} was initiated. Settling as failed.",
                    transaction.id, transaction.amount
                );
                (TransactionStatus::Failed, Some(AMOUNT_MISMATCH.to_string()))
            },
            None => {
                warn!("🔄️ Transaction #{} reported success without an amount. Settling as failed.", transaction.id);
                (TransactionStatus::Failed, Some(AMOUNT_MISMATCH.to_string()))
            },
        },
        CallbackOutcome::Failure => {
            let reason = event.failure_reason.clone().unwrap_or_else(|| "Payment failed".to_string());
            (TransactionStatus::Failed, Some(reason))
        },
        CallbackOutcome::Ambiguous => (TransactionStatus::Failed, Some(AMOUNT_MISMATCH.to_string())),
    }
}
