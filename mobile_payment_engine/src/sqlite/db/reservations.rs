use chrono::Duration;
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::OrderId, traits::PaymentStoreError};

/// Atomically acquire the initiation reservation for an order.
///
/// One statement covers both cases: a brand-new reservation is inserted, and an expired one (a crashed or stalled
/// initiator) is taken over via the conditional upsert. A live reservation held by someone else matches neither
/// branch, so zero rows change and the caller fails fast with `DuplicateInitiation` instead of blocking.
pub async fn acquire(
    order_id: &OrderId,
    ttl: Duration,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentStoreError> {
    let result = sqlx::query(
        r#"
            INSERT INTO initiation_reservations (order_id, expires_at)
            VALUES ($1, unixepoch(CURRENT_TIMESTAMP) + $2)
            ON CONFLICT (order_id) DO UPDATE SET expires_at = unixepoch(CURRENT_TIMESTAMP) + $2
            WHERE initiation_reservations.expires_at <= unixepoch(CURRENT_TIMESTAMP);
        "#,
    )
    .bind(order_id.as_str())
    .bind(ttl.num_seconds())
    .execute(conn)
    .await?;
    let acquired = result.rows_affected() == 1;
    trace!("🗃️ Reservation for order {order_id}: acquired={acquired}");
    Ok(acquired)
}

pub async fn release(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), PaymentStoreError> {
    sqlx::query("DELETE FROM initiation_reservations WHERE order_id = $1")
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
