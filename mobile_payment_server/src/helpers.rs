use hmac::{Hmac, Mac};
use log::error;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The base64-encoded HMAC-SHA256 of `data` under `secret`. This is the signature callers put in (and the
/// middleware checks against) the callback signature header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length, so this branch is unreachable in practice.
        Err(e) => {
            error!("🔐️ Could not construct the HMAC instance: {e}");
            return String::new();
        },
    };
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}
