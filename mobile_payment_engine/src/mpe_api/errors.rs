use mpg_common::Money;
use thiserror::Error;

use crate::{db_types::OrderId, traits::PaymentStoreError};

#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("Amount {amount} is outside the accepted range [{min}, {max}]")]
    AmountOutOfRange { amount: Money, min: Money, max: Money },
    /// Another initiation for this order is in flight, or an earlier one is still awaiting its callback.
    #[error("A payment for order {0} is already in progress")]
    DuplicateInitiation(OrderId),
    #[error("The payment gateway could not be reached: {0}")]
    GatewayUnavailable(String),
    #[error("The payment gateway rejected the push request: {0}")]
    GatewayRejected(String),
    #[error("Storage error during initiation: {0}")]
    Store(#[from] PaymentStoreError),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Storage error during reconciliation: {0}")]
    Store(#[from] PaymentStoreError),
}
