//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront, used for provider return URLs
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `BACKEND_API_URL` - Base URL of the commerce backend REST API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_API_TIMEOUT_SECS` - Backend request timeout (default: 15)
//! - `TAX_RATE` - VAT included in catalog prices (default: 0.15)
//! - `PAYPHONE_TOKEN`, `PAYPHONE_STORE_ID` - Enable Payphone card links and phone push
//! - `PAYPHONE_API_URL` - Payphone API base (default: `https://pay.payphonetodoenuno.com`)
//! - `MERCADOPAGO_ACCESS_TOKEN` - Enables Mercado Pago Checkout Pro
//! - `MERCADOPAGO_WEBHOOK_SECRET` - Verifies `x-signature` on webhooks
//! - `MERCADOPAGO_API_URL` - Mercado Pago API base (default: `https://api.mercadopago.com`)
//! - `DEPOSIT_BANK_NAME`, `DEPOSIT_ACCOUNT_NUMBER`, `DEPOSIT_ACCOUNT_HOLDER`,
//!   `DEPOSIT_ACCOUNT_TYPE` - Enable bank deposits
//! - `CRYPTO_WALLET_ADDRESS`, `CRYPTO_NETWORK`, `CRYPTO_ASSET` - Enable crypto deposits
//! - `PAYMENT_POLL_INTERVAL_SECS` - Status page poll interval (default: 3)
//! - `PAYMENT_POLL_MAX_ATTEMPTS` - Polls before an attempt expires (default: 40)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tienda_backend::BackendConfig;
use tienda_core::{PaymentMethod, PollPolicy};
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_PAYPHONE_API_URL: &str = "https://pay.payphonetodoenuno.com";
const DEFAULT_MERCADOPAGO_API_URL: &str = "https://api.mercadopago.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Commerce backend connection
    pub backend: BackendConfig,
    /// VAT rate included in catalog prices
    pub tax_rate: Decimal,
    /// Payment provider and deposit settings
    pub payments: PaymentsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Which payment methods are available and how to reach their providers.
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    pub payphone: Option<PayphoneConfig>,
    pub mercado_pago: Option<MercadoPagoConfig>,
    pub deposit: Option<DepositAccount>,
    pub crypto: Option<CryptoWallet>,
    pub poll: PollPolicy,
}

/// Payphone API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PayphoneConfig {
    pub token: SecretString,
    pub store_id: String,
    pub api_url: Url,
}

impl std::fmt::Debug for PayphoneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayphoneConfig")
            .field("token", &"[REDACTED]")
            .field("store_id", &self.store_id)
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

/// Mercado Pago API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MercadoPagoConfig {
    pub access_token: SecretString,
    pub webhook_secret: Option<SecretString>,
    pub api_url: Url,
}

impl std::fmt::Debug for MercadoPagoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoPagoConfig")
            .field("access_token", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

/// Bank account shown to customers paying by deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositAccount {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub account_type: String,
}

/// Wallet shown to customers paying with crypto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoWallet {
    pub address: String,
    pub network: String,
    pub asset: String,
}

impl PaymentsConfig {
    /// Methods the customer may choose at checkout, in display order.
    #[must_use]
    pub fn enabled_methods(&self) -> Vec<PaymentMethod> {
        let mut methods = Vec::new();
        if self.payphone.is_some() {
            methods.push(PaymentMethod::PayphoneLink);
            methods.push(PaymentMethod::PayphonePhone);
        }
        if self.mercado_pago.is_some() {
            methods.push(PaymentMethod::MercadoPago);
        }
        if self.deposit.is_some() {
            methods.push(PaymentMethod::CashDeposit);
        }
        if self.crypto.is_some() {
            methods.push(PaymentMethod::CryptoDeposit);
        }
        methods
    }

    #[must_use]
    pub fn is_enabled(&self, method: PaymentMethod) -> bool {
        self.enabled_methods().contains(&method)
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env.database_url("STOREFRONT_DATABASE_URL")?;
        let host = env.parse_or("STOREFRONT_HOST", "127.0.0.1")?;
        let port = env.parse_or("STOREFRONT_PORT", "3000")?;
        let base_url = env.url("STOREFRONT_BASE_URL")?;
        let session_secret = env.validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let backend = BackendConfig::new(
            env.url("BACKEND_API_URL")?,
            Duration::from_secs(env.parse_or("BACKEND_API_TIMEOUT_SECS", "15")?),
        );

        let tax_rate: Decimal = env.parse_or("TAX_RATE", "0.15")?;
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "TAX_RATE".to_string(),
                "must be between 0 and 1".to_string(),
            ));
        }

        let payments = PaymentsConfig::load(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            backend,
            tax_rate,
            payments,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the site is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Absolute URL for a storefront path, for provider redirects.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

impl PaymentsConfig {
    fn load<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let payphone = match env.optional("PAYPHONE_TOKEN") {
            Some(token) => Some(PayphoneConfig {
                token: SecretString::from(token),
                store_id: env.required("PAYPHONE_STORE_ID")?,
                api_url: env.url_or("PAYPHONE_API_URL", DEFAULT_PAYPHONE_API_URL)?,
            }),
            None => None,
        };

        let mercado_pago = match env.optional("MERCADOPAGO_ACCESS_TOKEN") {
            Some(token) => Some(MercadoPagoConfig {
                access_token: SecretString::from(token),
                webhook_secret: env.optional("MERCADOPAGO_WEBHOOK_SECRET").map(SecretString::from),
                api_url: env.url_or("MERCADOPAGO_API_URL", DEFAULT_MERCADOPAGO_API_URL)?,
            }),
            None => None,
        };

        let deposit = match env.optional("DEPOSIT_ACCOUNT_NUMBER") {
            Some(account_number) => Some(DepositAccount {
                bank_name: env.required("DEPOSIT_BANK_NAME")?,
                account_number,
                account_holder: env.required("DEPOSIT_ACCOUNT_HOLDER")?,
                account_type: env.or_default("DEPOSIT_ACCOUNT_TYPE", "Savings"),
            }),
            None => None,
        };

        let crypto = env.optional("CRYPTO_WALLET_ADDRESS").map(|address| CryptoWallet {
            address,
            network: env.or_default("CRYPTO_NETWORK", "TRC20"),
            asset: env.or_default("CRYPTO_ASSET", "USDT"),
        });

        let interval: u64 = env.parse_or("PAYMENT_POLL_INTERVAL_SECS", "3")?;
        let max_attempts: u32 = env.parse_or("PAYMENT_POLL_MAX_ATTEMPTS", "40")?;
        if interval == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            payphone,
            mercado_pago,
            deposit,
            crypto,
            poll: PollPolicy {
                interval: Duration::from_secs(interval),
                max_attempts,
            },
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Typed access to a variable source.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, using `default` when unset.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let value = self.required(key)?;
        parse_http_url(key, &value)
    }

    fn url_or(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        parse_http_url(key, &self.or_default(key, default))
    }

    /// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

fn parse_http_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SESSION_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/tienda"),
            ("STOREFRONT_BASE_URL", "https://tienda.ec"),
            ("STOREFRONT_SESSION_SECRET", SESSION_SECRET),
            ("BACKEND_API_URL", "http://localhost:8080/api"),
        ]
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = StorefrontConfig::from_lookup(lookup(&base_vars())).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.tax_rate, Decimal::new(15, 2));
        assert_eq!(config.backend.timeout, Duration::from_secs(15));
        assert_eq!(config.payments.poll, PollPolicy::default());
        assert!(config.payments.enabled_methods().is_empty());
        assert!(config.is_https());
        assert_eq!(
            config.absolute_url("/payments/payphone/return"),
            "https://tienda.ec/payments/payphone/return"
        );
    }

    #[test]
    fn test_missing_required_var() {
        let vars: Vec<_> = base_vars()
            .into_iter()
            .filter(|(k, _)| *k != "BACKEND_API_URL")
            .collect();
        let err = StorefrontConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "BACKEND_API_URL"));
    }

    #[test]
    fn test_payment_methods_follow_configuration() {
        let mut vars = base_vars();
        vars.extend([
            ("PAYPHONE_TOKEN", "pp-token"),
            ("PAYPHONE_STORE_ID", "store-1"),
            ("MERCADOPAGO_ACCESS_TOKEN", "APP_USR-1"),
            ("DEPOSIT_BANK_NAME", "Banco Pichincha"),
            ("DEPOSIT_ACCOUNT_NUMBER", "2200112233"),
            ("DEPOSIT_ACCOUNT_HOLDER", "Tienda S.A."),
            ("CRYPTO_WALLET_ADDRESS", "TXyz123"),
        ]);
        let config = StorefrontConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.payments.enabled_methods(),
            vec![
                PaymentMethod::PayphoneLink,
                PaymentMethod::PayphonePhone,
                PaymentMethod::MercadoPago,
                PaymentMethod::CashDeposit,
                PaymentMethod::CryptoDeposit,
            ]
        );
        let payphone = config.payments.payphone.unwrap();
        assert_eq!(payphone.api_url.as_str(), "https://pay.payphonetodoenuno.com/");
        assert_eq!(config.payments.crypto.unwrap().asset, "USDT");
        assert_eq!(config.payments.deposit.unwrap().account_type, "Savings");
    }

    #[test]
    fn test_payphone_requires_store_id() {
        let mut vars = base_vars();
        vars.push(("PAYPHONE_TOKEN", "pp-token"));
        let err = StorefrontConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "PAYPHONE_STORE_ID"));
    }

    #[test]
    fn test_invalid_tax_rate() {
        let mut vars = base_vars();
        vars.push(("TAX_RATE", "1.5"));
        assert!(matches!(
            StorefrontConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidEnvVar(k, _)) if k == "TAX_RATE"
        ));
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let mut vars = base_vars();
        vars.retain(|(k, _)| *k != "STOREFRONT_BASE_URL");
        vars.push(("STOREFRONT_BASE_URL", "ftp://tienda.ec"));
        assert!(StorefrontConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
        assert!(validate_secret_strength(&"a".repeat(40), "TEST_VAR").is_err());
        assert!(validate_secret_strength(SESSION_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_provider_config_debug_redacts_secrets() {
        let config = PayphoneConfig {
            token: SecretString::from("super_secret_payphone_token"),
            store_id: "store-123".to_string(),
            api_url: Url::parse(DEFAULT_PAYPHONE_API_URL).unwrap(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("store-123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_payphone_token"));

        let config = MercadoPagoConfig {
            access_token: SecretString::from("APP_USR-very-secret"),
            webhook_secret: Some(SecretString::from("whsec-very-secret")),
            api_url: Url::parse(DEFAULT_MERCADOPAGO_API_URL).unwrap(),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("very-secret"));
    }
}
