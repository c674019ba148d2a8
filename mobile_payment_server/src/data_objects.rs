use std::fmt::Display;

use mpg_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of `POST /payments`. Amounts are given in whole shillings, since that is the only granularity the
/// mobile-money network accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: String,
    pub amount: i64,
    /// The payer's phone number in MSISDN format, e.g. 254708374149.
    pub msisdn: String,
}

impl InitiatePaymentRequest {
    pub fn amount(&self) -> Money {
        Money::from_shillings(self.amount)
    }
}

/// The decision body the gateway expects from the validation endpoint. `"0"` accepts the payment;
/// `"C2B00012"` (invalid account) rejects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDecision {
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl GatewayDecision {
    pub fn accept() -> Self {
        Self { result_code: "0".to_string(), result_desc: "Accepted".to_string() }
    }

    pub fn reject<S: Display>(reason: S) -> Self {
        Self { result_code: "C2B00012".to_string(), result_desc: reason.to_string() }
    }
}
