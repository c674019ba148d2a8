use blake2::{digest::consts::U32, Blake2b, Digest};
use mpg_common::Money;

use crate::db_types::CallbackOutcome;

type Blake2b256 = Blake2b<U32>;

/// Digest of a normalized callback. Field values are length-prefixed so that adjacent fields cannot be confused
/// with one another ("ab" + "c" vs "a" + "bc").
pub fn callback_digest(
    gateway_reference: &str,
    outcome: CallbackOutcome,
    amount_confirmed: Option<Money>,
    failure_reason: Option<&str>,
) -> String {
    let mut hasher = Blake2b256::new();
    let field = |bytes: &[u8]| {
        let mut h = Blake2b256::new();
        h.update((bytes.len() as u64).to_le_bytes());
        h.update(bytes);
        h.finalize()
    };
    hasher.update(field(gateway_reference.as_bytes()));
    let outcome_tag: u8 = match outcome {
        CallbackOutcome::Success => 0,
        CallbackOutcome::Failure => 1,
        CallbackOutcome::Ambiguous => 2,
    };
    hasher.update([outcome_tag]);
    match amount_confirmed {
        Some(amount) => hasher.update(amount.value().to_le_bytes()),
        None => hasher.update(i64::MIN.to_le_bytes()),
    }
    hasher.update(field(failure_reason.unwrap_or("").as_bytes()));
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
