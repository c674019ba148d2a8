use mpg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::OrderId;

/// Emitted exactly once per order, on the first transition of its transaction into `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub order_id: OrderId,
    pub amount: Money,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order_id: OrderId,
    pub transaction_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTimedOutEvent {
    pub order_id: OrderId,
    pub transaction_id: i64,
}
