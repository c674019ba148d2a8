use chrono::Duration;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTransaction, OrderId, PaymentTransaction, TransactionStatus},
    traits::PaymentStoreError,
};

/// Inserts a freshly initiated transaction. The attempt count continues from any earlier (terminal) attempts for
/// the same order, so an order that failed and was retried carries its history in a single counter.
///
/// Two uniqueness guarantees come from the schema:
/// * the gateway reference is globally unique,
/// * at most one `Initiated` transaction may exist per order (partial unique index).
pub async fn insert_transaction(
    transaction: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentStoreError> {
    let gateway_reference = transaction.gateway_reference.clone();
    let order_id = transaction.order_id.clone();
    // RETURNING statements must be drained completely, or the implicit write transaction is still open when the
    // connection goes back to the pool and readers on other connections see the old row.
    let mut rows: Vec<PaymentTransaction> = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (order_id, gateway_reference, amount, attempt_count)
            VALUES (
                $1,
                $2,
                $3,
                COALESCE((SELECT MAX(attempt_count) FROM payment_transactions WHERE order_id = $1), 0) + 1
            )
            RETURNING *;
        "#,
    )
    .bind(transaction.order_id)
    .bind(transaction.gateway_reference)
    .bind(transaction.amount)
    .fetch_all(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            if err.message().contains("gateway_reference") {
                PaymentStoreError::TransactionAlreadyExists(gateway_reference.clone())
            } else {
                PaymentStoreError::DuplicateInitiation(order_id.clone())
            }
        },
        _ => PaymentStoreError::from(e),
    })?;
    let inserted = rows
        .pop()
        .ok_or_else(|| PaymentStoreError::DatabaseError("Transaction insert returned no row".to_string()))?;
    debug!("🗃️ Transaction for order {} inserted with reference {gateway_reference}", inserted.order_id);
    Ok(inserted)
}

pub async fn fetch_transaction_by_reference(
    gateway_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let transaction = sqlx::query_as("SELECT * FROM payment_transactions WHERE gateway_reference = $1")
        .bind(gateway_reference)
        .fetch_optional(conn)
        .await?;
    Ok(transaction)
}

/// The most recent transaction for the order.
pub async fn fetch_transaction_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let transaction =
        sqlx::query_as("SELECT * FROM payment_transactions WHERE order_id = $1 ORDER BY id DESC LIMIT 1")
            .bind(order_id.as_str())
            .fetch_optional(conn)
            .await?;
    Ok(transaction)
}

pub async fn has_initiated_transaction(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM payment_transactions WHERE order_id = $1 AND status = 'Initiated'")
            .bind(order_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}

/// The compare-and-swap write. A single conditional UPDATE, so two concurrent appliers (or an applier racing the
/// timeout sweep) cannot both win: exactly one sees the row returned, the others see `None`.
pub async fn update_status_if_initiated(
    transaction_id: i64,
    new_status: TransactionStatus,
    failure_reason: Option<String>,
    callback_digest: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
    let mut rows: Vec<PaymentTransaction> = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET status = $1, failure_reason = $2, raw_callback_digest = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND status = 'Initiated'
            RETURNING *;
        "#,
    )
    .bind(new_status.to_string())
    .bind(failure_reason)
    .bind(callback_digest)
    .bind(transaction_id)
    .fetch_all(conn)
    .await?;
    let result = rows.pop();
    trace!("🗃️ Conditional update of transaction {transaction_id} to {new_status}: won={}", result.is_some());
    Ok(result)
}

/// Transitions every transaction stuck in `Initiated` for longer than `older_than` to `TimedOut`, in one
/// statement. The WHERE clause doubles as the CAS: a transaction reconciled between the sweep being scheduled
/// and executed no longer matches and is left alone.
pub async fn sweep_stale(
    older_than: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
    let rows = sqlx::query_as(
        format!(
            "UPDATE payment_transactions SET status = 'TimedOut', \
             failure_reason = 'No gateway callback received before the deadline', \
             updated_at = CURRENT_TIMESTAMP \
             WHERE status = 'Initiated' AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) > {} \
             RETURNING *;",
            older_than.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
