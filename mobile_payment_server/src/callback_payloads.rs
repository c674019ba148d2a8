//! The gateway's callback payload shapes, and their normalization into the engine's [`CallbackEvent`].
//!
//! Three wire shapes arrive on four endpoints:
//! * the STK push result (`Body.stkCallback`, with a name/value `CallbackMetadata` bag on success),
//! * the flat C2B shape, shared by the confirmation and validation endpoints (the order reference travels in
//!   `BillRefNumber`),
//! * the timeout notice.
//!
//! Everything downstream of this module is gateway-agnostic.

use chrono::Utc;
use log::*;
use mobile_payment_engine::db_types::{CallbackEvent, CallbackOutcome};
use mpg_common::Money;
use serde::{Deserialize, Serialize};

//----------------------------------------   STK push result   -------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkResultDocument {
    #[serde(rename = "Body")]
    pub body: StkResultBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkResultBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub item: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    /// The confirmed amount from the metadata bag, if present. The gateway reports whole shillings as a JSON
    /// number, occasionally with a fractional part.
    fn confirmed_amount(&self) -> Option<Money> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == "Amount")
            .and_then(|item| item.value.as_ref())
            .and_then(|v| v.as_f64())
            .map(|v| Money::from_cents((v * 100.0).round() as i64))
    }

    pub fn into_callback_event(self, raw_payload: serde_json::Value) -> CallbackEvent {
        let (outcome, amount_confirmed, failure_reason) = if self.result_code == 0 {
            match self.confirmed_amount() {
                Some(amount) => (CallbackOutcome::Success, Some(amount), None),
                None => {
                    warn!("📥️ Success callback [{}] carries no amount", self.checkout_request_id);
                    (CallbackOutcome::Ambiguous, None, Some("Success callback without an amount".to_string()))
                },
            }
        } else {
            (CallbackOutcome::Failure, None, Some(self.result_desc.clone()))
        };
        CallbackEvent {
            gateway_reference: self.checkout_request_id,
            outcome,
            amount_confirmed,
            failure_reason,
            received_at: Utc::now(),
            raw_payload,
        }
    }
}

//----------------------------------------   C2B confirmation / validation   -----------------------------------------

/// The flat C2B shape. Used as-is on the confirmation endpoint and as the question on the validation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct C2bPayload {
    #[serde(rename = "TransID")]
    pub trans_id: String,
    #[serde(rename = "TransAmount")]
    pub trans_amount: String,
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    /// Carries the order id the payer (or the merchant site) entered as the account reference.
    #[serde(rename = "BillRefNumber")]
    pub bill_ref_number: String,
    #[serde(rename = "TransTime", default)]
    pub trans_time: Option<String>,
    #[serde(rename = "MSISDN", default)]
    pub msisdn: Option<String>,
}

impl C2bPayload {
    pub fn amount(&self) -> Option<Money> {
        parse_gateway_amount(&self.trans_amount)
    }

    /// Normalize a confirmation against the gateway reference the caller resolved from `BillRefNumber`. A
    /// confirmation without a parseable amount cannot be trusted to complete a payment, so it goes through as
    /// ambiguous.
    pub fn into_callback_event(self, gateway_reference: String, raw_payload: serde_json::Value) -> CallbackEvent {
        let amount = self.amount();
        let (outcome, failure_reason) = match amount {
            Some(_) => (CallbackOutcome::Success, None),
            None => {
                warn!("📥️ Confirmation {} has unparseable amount '{}'", self.trans_id, self.trans_amount);
                (CallbackOutcome::Ambiguous, Some(format!("Unparseable amount: {}", self.trans_amount)))
            },
        };
        CallbackEvent {
            gateway_reference,
            outcome,
            amount_confirmed: amount,
            failure_reason,
            received_at: Utc::now(),
            raw_payload,
        }
    }
}

//----------------------------------------   Timeout notice   --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutNotice {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

impl TimeoutNotice {
    pub fn into_callback_event(self, raw_payload: serde_json::Value) -> CallbackEvent {
        let reason = self.result_desc.unwrap_or_else(|| "The gateway reported a processing timeout".to_string());
        CallbackEvent {
            gateway_reference: self.checkout_request_id,
            outcome: CallbackOutcome::Failure,
            amount_confirmed: None,
            failure_reason: Some(reason),
            received_at: Utc::now(),
            raw_payload,
        }
    }
}

/// The gateway expresses amounts as decimal strings ("100.00"). Anything beyond cents precision is rejected.
pub fn parse_gateway_amount(amount: &str) -> Option<Money> {
    let mut parts = amount.split('.');
    let whole_units = parts.next()?.parse::<i64>().ok()?;
    let cents = match parts.next() {
        None => 0,
        Some(c) if c.len() <= 2 => {
            let parsed = c.parse::<i64>().ok()?;
            if c.len() == 1 {
                parsed * 10
            } else {
                parsed
            }
        },
        Some(_) => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    // The string is attacker-controlled, so the cents conversion must not overflow.
    let total_cents = whole_units.checked_mul(100)?.checked_add(cents)?;
    Some(Money::from_cents(total_cents))
}

#[cfg(test)]
mod test {
    use mobile_payment_engine::db_types::CallbackOutcome;
    use mpg_common::Money;

    use super::{parse_gateway_amount, StkResultDocument};

    #[test]
    fn gateway_amounts_parse_to_cents() {
        assert_eq!(parse_gateway_amount("100.00"), Some(Money::from_shillings(100)));
        assert_eq!(parse_gateway_amount("100.5"), Some(Money::from_cents(10050)));
        assert_eq!(parse_gateway_amount("100"), Some(Money::from_shillings(100)));
        assert_eq!(parse_gateway_amount("0.05"), Some(Money::from_cents(5)));
        assert_eq!(parse_gateway_amount("100.123"), None);
        assert_eq!(parse_gateway_amount("1.2.3"), None);
        assert_eq!(parse_gateway_amount("ten"), None);
    }

    #[test]
    fn absurd_gateway_amounts_are_rejected_not_wrapped() {
        assert_eq!(parse_gateway_amount(&i64::MAX.to_string()), None);
        assert_eq!(parse_gateway_amount("92233720368547758.99"), None);
        // The largest representable amount still parses.
        assert_eq!(parse_gateway_amount("92233720368547758.07"), Some(Money::from_cents(i64::MAX)));
    }

    #[test]
    fn successful_stk_result_normalizes_with_amount() {
        let raw = serde_json::json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": { "Item": [
                    { "Name": "Amount", "Value": 500.0 },
                    { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                    { "Name": "PhoneNumber", "Value": 254708374149u64 }
                ]}
            }}
        });
        let doc: StkResultDocument = serde_json::from_value(raw.clone()).unwrap();
        let event = doc.body.stk_callback.into_callback_event(raw);
        assert_eq!(event.gateway_reference, "ws_CO_191220191020363925");
        assert_eq!(event.outcome, CallbackOutcome::Success);
        assert_eq!(event.amount_confirmed, Some(Money::from_shillings(500)));
        assert!(event.failure_reason.is_none());
    }

    #[test]
    fn cancelled_stk_result_normalizes_to_failure() {
        let raw = serde_json::json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }}
        });
        let doc: StkResultDocument = serde_json::from_value(raw.clone()).unwrap();
        let event = doc.body.stk_callback.into_callback_event(raw);
        assert_eq!(event.outcome, CallbackOutcome::Failure);
        assert_eq!(event.failure_reason.as_deref(), Some("Request cancelled by user"));
        assert!(event.amount_confirmed.is_none());
    }

    #[test]
    fn success_without_metadata_is_ambiguous() {
        let raw = serde_json::json!({
            "Body": { "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully."
            }}
        });
        let doc: StkResultDocument = serde_json::from_value(raw.clone()).unwrap();
        let event = doc.body.stk_callback.into_callback_event(raw);
        assert_eq!(event.outcome, CallbackOutcome::Ambiguous);
    }
}
