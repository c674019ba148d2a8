mod hmac;

pub use hmac::{HmacMiddlewareFactory, HMAC_HEADER};
