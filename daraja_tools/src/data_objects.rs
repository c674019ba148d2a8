use serde::{Deserialize, Serialize};

/// The wire payload for an STK push request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// The synchronous acknowledgement returned by the gateway for an STK push.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    pub response_code: String,
    pub response_description: String,
    #[serde(default)]
    pub customer_message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: String,
}

/// A successful push acknowledgement, reduced to the fields the payment engine cares about. The checkout request id
/// is the gateway reference that all later callbacks correlate on.
#[derive(Debug, Clone)]
pub struct PushAck {
    pub gateway_reference: String,
    pub merchant_request_id: String,
    pub description: String,
}

impl From<StkPushResponse> for PushAck {
    fn from(r: StkPushResponse) -> Self {
        Self {
            gateway_reference: r.checkout_request_id,
            merchant_request_id: r.merchant_request_id,
            description: r.response_description,
        }
    }
}
