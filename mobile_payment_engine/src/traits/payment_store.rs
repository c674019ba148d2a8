use chrono::Duration;
use thiserror::Error;

use crate::db_types::{
    CallbackEvent,
    NewTransaction,
    Order,
    OrderId,
    OrphanCallback,
    PaymentTransaction,
    TransactionStatus,
};

/// The narrow repository interface backing the payment engine.
///
/// The store is the single source of truth for `PaymentTransaction` records and the only component with write
/// access to their status. Every status transition goes through [`PaymentStore::update_status_if_initiated`] or
/// [`PaymentStore::sweep_stale_transactions`], which are single conditional writes, never read-then-write pairs.
/// Keeping the compare-and-swap discipline here means no caller can accidentally assemble a lost-update race.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Persist a freshly initiated transaction. The attempt count continues from any previous (terminal)
    /// attempts for the same order. Fails with [`PaymentStoreError::TransactionAlreadyExists`] if the gateway
    /// reference is already known, or [`PaymentStoreError::DuplicateInitiation`] if the order already has a
    /// transaction in `Initiated` status.
    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<PaymentTransaction, PaymentStoreError>;

    async fn fetch_transaction_by_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    /// The most recent transaction for the order, if any.
    async fn fetch_transaction_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    /// True if the order currently has a transaction in `Initiated` status.
    async fn has_initiated_transaction(&self, order_id: &OrderId) -> Result<bool, PaymentStoreError>;

    /// The compare-and-swap primitive: transition the transaction to `new_status` only if its stored status is
    /// still `Initiated`, recording the callback digest and failure reason in the same write.
    ///
    /// Returns `None` when the conditional write matched no row, i.e. a concurrent applier already owns the
    /// outcome. That is a coordination signal, not an error.
    async fn update_status_if_initiated(
        &self,
        transaction_id: i64,
        new_status: TransactionStatus,
        failure_reason: Option<String>,
        callback_digest: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    /// Transition every transaction left in `Initiated` for longer than `older_than` to `TimedOut`, in a single
    /// conditional statement. Returns the transactions that were swept (each exactly once, by CAS).
    async fn sweep_stale_transactions(
        &self,
        older_than: Duration,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError>;

    /// Atomically acquire the per-order initiation reservation. Returns `false` if another initiator holds a
    /// live reservation; an expired reservation is taken over in the same statement. A crashed initiator's
    /// reservation simply expires after `ttl`.
    async fn acquire_initiation_reservation(
        &self,
        order_id: &OrderId,
        ttl: Duration,
    ) -> Result<bool, PaymentStoreError>;

    async fn release_initiation_reservation(&self, order_id: &OrderId) -> Result<(), PaymentStoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    /// Create the order row if the external order store has not mirrored it yet. Idempotent.
    async fn upsert_order(&self, order_id: &OrderId, amount: mpg_common::Money) -> Result<Order, PaymentStoreError>;

    /// Transition the order to `Paid`. Only ever called on the first successful reconciliation; calling it again
    /// is a no-op (the order stays `Paid`).
    async fn mark_order_paid(&self, order_id: &OrderId) -> Result<Order, PaymentStoreError>;

    /// Record a callback whose gateway reference matched no transaction. Diagnostics only; the gateway still
    /// receives an acknowledgement.
    async fn record_orphan_callback(&self, event: &CallbackEvent) -> Result<(), PaymentStoreError>;

    async fn count_orphan_callbacks(&self) -> Result<i64, PaymentStoreError>;

    /// The most recent orphan callbacks, newest first, so support staff can inspect and replay them.
    async fn fetch_orphan_callbacks(&self, limit: i64) -> Result<Vec<OrphanCallback>, PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Internal database error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Cannot insert transaction, since gateway reference {0} already exists")]
    TransactionAlreadyExists(String),
    #[error("Order {0} already has a transaction in Initiated status")]
    DuplicateInitiation(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested transaction (internal id {0}) does not exist")]
    TransactionIdNotFound(i64),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
