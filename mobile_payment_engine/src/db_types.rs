use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mpg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::callback_digest;

/// The failure reason recorded when a success callback reports an amount that does not match the transaction.
pub const AMOUNT_MISMATCH: &str = "AmountMismatch";

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   TransactionStatus   -------------------------------------------------------
/// The payment transaction state machine. `Initiated` is the only non-terminal state; once a transaction reaches
/// `Completed`, `Failed` or `TimedOut` it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The gateway acknowledged the push request; no outcome callback has been applied yet.
    Initiated,
    /// A success callback with a matching amount was applied.
    Completed,
    /// The gateway reported failure, or the confirmed amount did not match.
    Failed,
    /// No callback arrived before the sweep deadline.
    TimedOut,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Initiated)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Initiated => write!(f, "Initiated"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::TimedOut => write!(f, "TimedOut"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid transaction status: {0}")]
pub struct ConversionError(String);

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "TimedOut" => Ok(Self::TimedOut),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to Failed");
            TransactionStatus::Failed
        })
    }
}

//--------------------------------------   PaymentTransaction   ------------------------------------------------------
/// A single push-payment attempt. Retained indefinitely for audit; the status column is only ever written through
/// the store's conditional-update primitive.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub order_id: OrderId,
    /// Assigned by the gateway at initiation time. Unique across all transactions once assigned.
    pub gateway_reference: Option<String>,
    pub amount: Money,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    /// Digest of the most recently applied callback payload, used to tell redeliveries from late distinct events.
    pub raw_callback_digest: Option<String>,
    pub attempt_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: OrderId,
    pub gateway_reference: String,
    pub amount: Money,
}

impl NewTransaction {
    pub fn new(order_id: OrderId, gateway_reference: String, amount: Money) -> Self {
        Self { order_id, gateway_reference, amount }
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// No successful payment has been reconciled against the order.
    Pending,
    /// The linked transaction completed. Never reverted.
    Paid,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------        Order          -------------------------------------------------------
/// The slice of the external order entity this core reads. Only `status` is ever written, and only to `Paid`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    OrphanCallback     -------------------------------------------------------
/// A stored callback that matched no transaction, read back when support staff chase a charge the platform never
/// credited.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrphanCallback {
    pub id: i64,
    pub gateway_reference: String,
    pub digest: String,
    /// The raw payload as received, so the callback can be replayed once the cause is understood.
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

//--------------------------------------     CallbackEvent     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackOutcome {
    Success,
    Failure,
    /// The callback did not carry enough information to confirm the payment, e.g. a confirmation without a
    /// usable amount. Treated as a failure with [`AMOUNT_MISMATCH`].
    Ambiguous,
}

/// The canonical, gateway-agnostic form of an inbound callback. Transient; only its digest is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub gateway_reference: String,
    pub outcome: CallbackOutcome,
    pub amount_confirmed: Option<Money>,
    pub failure_reason: Option<String>,
    pub received_at: DateTime<Utc>,
    pub raw_payload: serde_json::Value,
}

impl CallbackEvent {
    /// The de-duplication digest. Computed over the normalized fields rather than the raw bytes so that two
    /// deliveries of the same event digest identically even if the gateway reserializes the payload.
    pub fn digest(&self) -> String {
        callback_digest(&self.gateway_reference, self.outcome, self.amount_confirmed, self.failure_reason.as_deref())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            TransactionStatus::Initiated,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::TimedOut,
        ] {
            assert_eq!(s.to_string().parse::<TransactionStatus>().unwrap(), s);
        }
        assert!("Complete".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!TransactionStatus::Initiated.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::TimedOut.is_terminal());
    }
}
