use chrono::{DateTime, Utc};

/// The gateway expects timestamps in the `YYYYMMDDHHmmss` format, Nairobi wall-clock time is not required; the
/// password digest only needs to match the timestamp sent in the same request.
pub fn daraja_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// The per-request push password: base64(shortcode + passkey + timestamp).
pub fn daraja_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}
