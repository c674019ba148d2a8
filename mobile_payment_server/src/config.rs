use std::env;

use chrono::Duration;
use daraja_tools::DarajaConfig;
use log::*;
use mobile_payment_engine::GatewayLimits;
use mpg_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_MPG_HOST: &str = "127.0.0.1";
const DEFAULT_MPG_PORT: u16 = 8360;
/// How long a transaction may sit in `Initiated` before the sweeper settles it as `TimedOut`. The payer is given
/// a couple of minutes to find their phone and type a PIN; the gateway itself gives up well before this.
const DEFAULT_PENDING_PAYMENT_TIMEOUT: Duration = Duration::minutes(3);
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_INITIATION_LOCK_TTL: Duration = Duration::seconds(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The time before a transaction awaiting its callback is considered abandoned and marked as timed out.
    pub pending_payment_timeout: Duration,
    /// How often the timeout sweeper runs.
    pub sweep_interval: std::time::Duration,
    /// TTL on the per-order initiation lock. Only relevant when an initiator crashes mid-flight.
    pub initiation_lock_ttl: Duration,
    /// Authentication settings for the inbound callback endpoints.
    pub callback_auth: CallbackAuthConfig,
    /// Outbound gateway configuration.
    pub daraja: DarajaConfig,
}

#[derive(Clone, Debug, Default)]
pub struct CallbackAuthConfig {
    pub hmac_secret: Secret<String>,
    /// If false, the middleware lets every callback through. Dev/sandbox only.
    pub hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPG_HOST.to_string(),
            port: DEFAULT_MPG_PORT,
            database_url: String::default(),
            pending_payment_timeout: DEFAULT_PENDING_PAYMENT_TIMEOUT,
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            initiation_lock_ttl: DEFAULT_INITIATION_LOCK_TTL,
            callback_auth: CallbackAuthConfig::default(),
            daraja: DarajaConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPG_HOST").ok().unwrap_or_else(|| DEFAULT_MPG_HOST.into());
        let port = env::var("MPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPG_PORT. {e} Using the default, {DEFAULT_MPG_PORT}, instead."
                    );
                    DEFAULT_MPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPG_PORT);
        let database_url = env::var("MPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPG_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let pending_payment_timeout = read_seconds("MPG_PENDING_PAYMENT_TIMEOUT", DEFAULT_PENDING_PAYMENT_TIMEOUT);
        let sweep_interval = env::var("MPG_SWEEP_INTERVAL")
            .ok()
            .and_then(|s| {
                s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for MPG_SWEEP_INTERVAL. {e}")).ok()
            })
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS));
        let initiation_lock_ttl = read_seconds("MPG_INITIATION_LOCK_TTL", DEFAULT_INITIATION_LOCK_TTL);
        let callback_auth = CallbackAuthConfig::from_env_or_default();
        let daraja = DarajaConfig::new_from_env_or_default();
        Self { host, port, database_url, pending_payment_timeout, sweep_interval, initiation_lock_ttl, callback_auth, daraja }
    }

    /// The amount bounds and shortcode the initiator and the validation endpoint check against.
    pub fn gateway_limits(&self) -> GatewayLimits {
        GatewayLimits {
            min_amount: self.daraja.min_amount,
            max_amount: self.daraja.max_amount,
            shortcode: self.daraja.shortcode.clone(),
        }
    }
}

impl CallbackAuthConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = env::var("MPG_CALLBACK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MPG_CALLBACK_HMAC_SECRET is not set. Please set it to the shared callback signing key.");
            String::default()
        });
        let hmac_secret = Secret::new(hmac_secret);
        let hmac_checks = parse_boolean_flag(env::var("MPG_CALLBACK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!(
                "🚨️ Callback HMAC checks are disabled. Anyone who can reach this server can forge gateway \
                 callbacks. Do not run production like this."
            );
        }
        Self { hmac_secret, hmac_checks }
    }
}

fn read_seconds(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {} s.", default.num_seconds()))
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::seconds)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}
