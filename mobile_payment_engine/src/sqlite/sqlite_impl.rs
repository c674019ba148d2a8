//! `SqliteDatabase` is the concrete [`PaymentStore`] backend.
use std::fmt::Debug;

use chrono::Duration;
use mpg_common::Money;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, orphans, reservations, transactions};
use crate::{
    db_types::{CallbackEvent, NewTransaction, Order, OrderId, OrphanCallback, PaymentTransaction, TransactionStatus},
    traits::{PaymentStore, PaymentStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect using the URL from `MPG_DATABASE_URL`, or the default.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentStoreError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentStoreError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_transaction(&self, transaction: NewTransaction) -> Result<PaymentTransaction, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::insert_transaction(transaction, &mut conn).await
    }

    async fn fetch_transaction_by_reference(
        &self,
        gateway_reference: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let transaction = transactions::fetch_transaction_by_reference(gateway_reference, &mut conn).await?;
        Ok(transaction)
    }

    async fn fetch_transaction_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let transaction = transactions::fetch_transaction_for_order(order_id, &mut conn).await?;
        Ok(transaction)
    }

    async fn has_initiated_transaction(&self, order_id: &OrderId) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::has_initiated_transaction(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn update_status_if_initiated(
        &self,
        transaction_id: i64,
        new_status: TransactionStatus,
        failure_reason: Option<String>,
        callback_digest: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::update_status_if_initiated(transaction_id, new_status, failure_reason, callback_digest, &mut conn)
            .await
    }

    async fn sweep_stale_transactions(
        &self,
        older_than: Duration,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::sweep_stale(older_than, &mut conn).await
    }

    async fn acquire_initiation_reservation(
        &self,
        order_id: &OrderId,
        ttl: Duration,
    ) -> Result<bool, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        reservations::acquire(order_id, ttl, &mut conn).await
    }

    async fn release_initiation_reservation(&self, order_id: &OrderId) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        reservations::release(order_id, &mut conn).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn upsert_order(&self, order_id: &OrderId, amount: Money) -> Result<Order, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::upsert_order(order_id, amount, &mut conn).await
    }

    async fn mark_order_paid(&self, order_id: &OrderId) -> Result<Order, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_order_paid(order_id, &mut conn).await
    }

    async fn record_orphan_callback(&self, event: &CallbackEvent) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orphans::record(event, &mut conn).await
    }

    async fn count_orphan_callbacks(&self) -> Result<i64, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orphans::count(&mut conn).await
    }

    async fn fetch_orphan_callbacks(&self, limit: i64) -> Result<Vec<OrphanCallback>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        orphans::fetch(limit, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
