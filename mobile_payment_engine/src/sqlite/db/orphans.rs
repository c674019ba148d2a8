use sqlx::SqliteConnection;

use crate::{
    db_types::{CallbackEvent, OrphanCallback},
    traits::PaymentStoreError,
};

/// Record a callback that matched no transaction. Support staff query this table when a payer reports a charge
/// the platform never credited.
pub async fn record(event: &CallbackEvent, conn: &mut SqliteConnection) -> Result<(), PaymentStoreError> {
    sqlx::query(
        r#"
            INSERT INTO orphan_callbacks (gateway_reference, digest, payload, received_at)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(&event.gateway_reference)
    .bind(event.digest())
    .bind(event.raw_payload.to_string())
    .bind(event.received_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64, PaymentStoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orphan_callbacks").fetch_one(conn).await?;
    Ok(count)
}

/// The most recently received orphans first.
pub async fn fetch(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<OrphanCallback>, PaymentStoreError> {
    let orphans = sqlx::query_as("SELECT * FROM orphan_callbacks ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(orphans)
}
