use log::*;
use mpg_common::Money;

use crate::mpe_api::GatewayLimits;

/// The answer to the gateway's pre-payment validation question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationDecision {
    Accept,
    Reject(String),
}

impl ValidationDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, ValidationDecision::Accept)
    }
}

/// Decide whether an externally-originated payment should be allowed through.
///
/// The gateway calls this *before* money moves, so a rejection here is cheap; anything that slips through is
/// handled by the amount-match gate at reconciliation time instead.
pub fn decide_validation(amount: Money, shortcode: &str, limits: &GatewayLimits) -> ValidationDecision {
    if shortcode != limits.shortcode {
        info!("🛂️ Rejecting payment of {amount}: shortcode {shortcode} is not ours");
        return ValidationDecision::Reject(format!("Unknown shortcode {shortcode}"));
    }
    if amount < limits.min_amount || amount > limits.max_amount {
        info!("🛂️ Rejecting payment of {amount}: outside accepted range");
        return ValidationDecision::Reject(format!(
            "Amount {amount} is outside the accepted range [{}, {}]",
            limits.min_amount, limits.max_amount
        ));
    }
    ValidationDecision::Accept
}

#[cfg(test)]
mod test {
    use mpg_common::Money;

    use super::{decide_validation, ValidationDecision};
    use crate::mpe_api::GatewayLimits;

    fn limits() -> GatewayLimits {
        GatewayLimits {
            min_amount: Money::from_shillings(1),
            max_amount: Money::from_shillings(150_000),
            shortcode: "174379".to_string(),
        }
    }

    #[test]
    fn in_range_payment_is_accepted() {
        let decision = decide_validation(Money::from_shillings(500), "174379", &limits());
        assert!(decision.is_accept());
    }

    #[test]
    fn wrong_shortcode_is_rejected() {
        let decision = decide_validation(Money::from_shillings(500), "600000", &limits());
        assert!(matches!(decision, ValidationDecision::Reject(_)));
    }

    #[test]
    fn amount_outside_limits_is_rejected() {
        let too_much = decide_validation(Money::from_shillings(200_000), "174379", &limits());
        assert!(matches!(too_much, ValidationDecision::Reject(_)));
        let too_little = decide_validation(Money::from_cents(50), "174379", &limits());
        assert!(matches!(too_little, ValidationDecision::Reject(_)));
    }

    #[test]
    fn boundary_amounts_are_accepted() {
        let limits = limits();
        assert!(decide_validation(limits.min_amount, "174379", &limits).is_accept());
        assert!(decide_validation(limits.max_amount, "174379", &limits).is_accept());
    }
}
