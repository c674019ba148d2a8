use log::debug;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderId},
    traits::PaymentStoreError,
};

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Mirrors an order from the external order store. Idempotent: an existing row is returned unchanged.
pub async fn upsert_order(
    order_id: &OrderId,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentStoreError> {
    if let Some(order) = fetch_order(order_id, conn).await? {
        return Ok(order);
    }
    // Drained via fetch_all so the implicit write transaction commits before the connection is reused.
    let mut rows: Vec<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, amount) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(amount)
    .fetch_all(conn)
    .await?;
    let order = rows.pop().ok_or_else(|| PaymentStoreError::DatabaseError("Order insert returned no row".to_string()))?;
    debug!("🗃️ Order {order_id} mirrored into the store");
    Ok(order)
}

/// Transitions the order to `Paid`, only in the Pending -> Paid direction. A second call finds the order already
/// `Paid` and returns it untouched, so the reconciliation engine can treat this as idempotent.
pub async fn mark_order_paid(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, PaymentStoreError> {
    let mut rows: Vec<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'Paid', updated_at = CURRENT_TIMESTAMP \
         WHERE order_id = $1 AND status = 'Pending' RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    match rows.pop() {
        Some(order) => Ok(order),
        None => {
            // No row matched: either the order is already Paid (fine) or it does not exist.
            match fetch_order(order_id, conn).await? {
                Some(order) => Ok(order),
                None => Err(PaymentStoreError::OrderNotFound(order_id.clone())),
            }
        },
    }
}
