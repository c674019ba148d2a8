use mpg_common::Money;
use thiserror::Error;

use crate::db_types::OrderId;

/// What the initiator hands to the outbound gateway adapter.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub order_id: OrderId,
    pub amount: Money,
    /// The payer's phone number, in the gateway's expected MSISDN format.
    pub msisdn: String,
}

/// The synchronous acknowledgement from the gateway: the reference every later callback will correlate on.
#[derive(Debug, Clone)]
pub struct PushAcknowledgement {
    pub gateway_reference: String,
    pub description: String,
}

/// Seam between the engine and the concrete gateway client, so the initiator can be exercised against a mock.
/// Implementations must enforce a bounded call timeout: a slow gateway fails the initiate call within seconds.
#[allow(async_fn_in_trait)]
pub trait PushGateway: Clone {
    async fn push(&self, request: &PushRequest) -> Result<PushAcknowledgement, PushError>;
}

#[derive(Debug, Clone, Error)]
pub enum PushError {
    /// Network failure or timeout reaching the gateway. The payment was (as far as we know) never prompted.
    #[error("The gateway could not be reached: {0}")]
    Unavailable(String),
    /// The gateway answered and said no (bad credentials, invalid shortcode, malformed request).
    #[error("The gateway rejected the push request: {0}")]
    Rejected(String),
}
