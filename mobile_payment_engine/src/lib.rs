//! Mobile Payment Engine
//!
//! The engine owns the hard part of the platform: initiating push payments against the mobile-money gateway and
//! durably, idempotently reconciling order state against the asynchronous callbacks that report their outcome.
//! Callbacks may arrive zero, one or many times, out of order, and on a separate network path from the request
//! that triggered them; every state transition in this crate therefore goes through a single conditional write.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. Access goes through the narrow
//!    [`traits::PaymentStore`] repository interface so that the compare-and-swap discipline is enforced at the
//!    storage boundary rather than assembled per call site.
//! 2. The engine public API ([`mod@mpe_api`]): the [`StkPushInitiator`] and the [`ReconciliationApi`] state
//!    machine.
//! 3. Events ([`mod@events`]): a small pub-sub channel that emits `PaymentCompleted`, `PaymentFailed` and
//!    `PaymentTimedOut` events to whatever sink the server wires up.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod mpe_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use mpe_api::{
    errors::{InitiateError, ReconcileError},
    initiator::StkPushInitiator,
    reconciliation::{ApplyOutcome, ReconciliationApi},
    validation::{decide_validation, ValidationDecision},
    GatewayLimits,
};
