//! Adapter between the engine's [`PushGateway`] seam and the concrete Daraja client.

use daraja_tools::DarajaApi;
use log::*;
use mobile_payment_engine::traits::{PushAcknowledgement, PushError, PushGateway, PushRequest};

#[derive(Clone)]
pub struct DarajaGateway {
    api: DarajaApi,
}

impl DarajaGateway {
    pub fn new(api: DarajaApi) -> Self {
        Self { api }
    }
}

impl PushGateway for DarajaGateway {
    async fn push(&self, request: &PushRequest) -> Result<PushAcknowledgement, PushError> {
        trace!("📲️ Forwarding push request for order {} to the gateway", request.order_id);
        let ack = self.api.stk_push(request.amount, &request.msisdn).await.map_err(|e| {
            if e.is_rejection() {
                PushError::Rejected(e.to_string())
            } else {
                PushError::Unavailable(e.to_string())
            }
        })?;
        debug!("📲️ Gateway acknowledged push for order {}: {}", request.order_id, ack.description);
        Ok(PushAcknowledgement { gateway_reference: ack.gateway_reference, description: ack.description })
    }
}
