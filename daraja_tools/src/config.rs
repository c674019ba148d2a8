use log::*;
use mpg_common::{Money, Secret};

pub const DEFAULT_MIN_AMOUNT_CENTS: i64 = 100; // KSh 1
pub const DEFAULT_MAX_AMOUNT_CENTS: i64 = 7_000_000; // KSh 70,000

/// Which gateway deployment to talk to. Sandbox and live use different base URLs and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Sandbox,
    Live,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.safaricom.co.ke",
            Environment::Live => "https://api.safaricom.co.ke",
        }
    }
}

/// The four URLs the gateway calls back on. These are registered with the gateway out of band; the client only
/// sends the push-result URL along with each STK push request.
#[derive(Debug, Clone, Default)]
pub struct CallbackUrls {
    pub result: String,
    pub confirmation: String,
    pub validation: String,
    pub timeout: String,
}

/// A read-only snapshot of the gateway credentials and payment bounds. The configuration collaborator owns these
/// values; this crate never persists or rotates them.
#[derive(Debug, Clone, Default)]
pub struct DarajaConfig {
    pub environment: Environment,
    pub shortcode: String,
    pub passkey: Secret<String>,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    pub min_amount: Money,
    pub max_amount: Money,
    pub account_reference: String,
    pub transaction_description: String,
    pub callback_urls: CallbackUrls,
}

impl DarajaConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = match std::env::var("MPG_DARAJA_ENVIRONMENT").map(|s| s.to_lowercase()) {
            Ok(s) if s == "live" => Environment::Live,
            Ok(s) if s == "sandbox" => Environment::Sandbox,
            _ => {
                warn!("MPG_DARAJA_ENVIRONMENT not set, using sandbox as default");
                Environment::Sandbox
            },
        };
        let shortcode = std::env::var("MPG_DARAJA_SHORTCODE").unwrap_or_else(|_| {
            warn!("MPG_DARAJA_SHORTCODE not set, using the sandbox test shortcode");
            "174379".to_string()
        });
        let passkey = Secret::new(std::env::var("MPG_DARAJA_PASSKEY").unwrap_or_else(|_| {
            warn!("MPG_DARAJA_PASSKEY not set, using (probably useless) default");
            "0000000000000000".to_string()
        }));
        let consumer_key = Secret::new(std::env::var("MPG_DARAJA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("MPG_DARAJA_CONSUMER_KEY not set, using (probably useless) default");
            "0000000000000000".to_string()
        }));
        let consumer_secret = Secret::new(std::env::var("MPG_DARAJA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("MPG_DARAJA_CONSUMER_SECRET not set, using (probably useless) default");
            "0000000000000000".to_string()
        }));
        let min_amount = read_amount("MPG_MIN_AMOUNT", DEFAULT_MIN_AMOUNT_CENTS);
        let max_amount = read_amount("MPG_MAX_AMOUNT", DEFAULT_MAX_AMOUNT_CENTS);
        let account_reference = std::env::var("MPG_ACCOUNT_REFERENCE").unwrap_or_else(|_| "MPG".to_string());
        let transaction_description =
            std::env::var("MPG_TRANSACTION_DESCRIPTION").unwrap_or_else(|_| "Order payment".to_string());
        let callback_urls = CallbackUrls {
            result: callback_url("MPG_RESULT_URL", "gateway/result"),
            confirmation: callback_url("MPG_CONFIRMATION_URL", "gateway/confirmation"),
            validation: callback_url("MPG_VALIDATION_URL", "gateway/validation"),
            timeout: callback_url("MPG_TIMEOUT_URL", "gateway/timeout"),
        };
        let config = Self {
            environment,
            shortcode,
            passkey,
            consumer_key,
            consumer_secret,
            min_amount,
            max_amount,
            account_reference,
            transaction_description,
            callback_urls,
        };
        if config.min_amount > config.max_amount {
            warn!(
                "🪛️ The configured minimum amount ({}) exceeds the maximum ({}). Every initiation will be rejected \
                 until this is corrected.",
                config.min_amount, config.max_amount
            );
        }
        config
    }
}

fn read_amount(var: &str, default_cents: i64) -> Money {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid amount in {var}: {e}. Using the default."))
                .ok()
        })
        .map(Money::from_cents)
        .unwrap_or_else(|| Money::from_cents(default_cents))
}

fn callback_url(var: &str, path: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| {
        let base = std::env::var("MPG_PUBLIC_URL").unwrap_or_else(|_| "https://localhost:8360".to_string());
        format!("{}/{path}", base.trim_end_matches('/'))
    })
}
