//! # Mobile payment engine public API
//!
//! The `mpe_api` module exposes the programmatic API for the mobile payment engine.
//! The API is modular, so that clients can pick and choose the functionality they want, or run different parts
//! (e.g. initiation and reconciliation) on different machines.
//!
//! * [`initiator`] starts payments: it acquires the per-order initiation lock, calls the outbound push gateway,
//!   and persists the resulting transaction.
//! * [`reconciliation`] settles payments: it applies inbound gateway callbacks to stored transactions and sweeps
//!   transactions whose callback never arrived.
//! * [`validation`] answers the gateway's pre-payment validation question.
//!
//! # API usage
//!
//! The pattern for both APIs is the same. An instance is created by supplying a database backend that implements
//! [`crate::traits::PaymentStore`]:
//!
//! ```rust,ignore
//! use mobile_payment_engine::{ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = ReconciliationApi::new(db, producers);
//! let outcome = api.apply(callback_event).await?;
//! ```

use mpg_common::Money;

pub mod errors;
pub mod initiator;
pub mod reconciliation;
pub mod validation;

/// The merchant-side constraints every push and every validation decision is checked against.
#[derive(Debug, Clone)]
pub struct GatewayLimits {
    pub min_amount: Money,
    pub max_amount: Money,
    /// The merchant shortcode payments must be addressed to.
    pub shortcode: String,
}
