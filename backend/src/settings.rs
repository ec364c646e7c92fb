//! Service configuration loaded once at start-up via OrthoConfig.
//!
//! Values come from CLI flags, `PAYOUTS_*` environment variables, and an
//! optional config file. Components never read the environment themselves:
//! `main` converts these settings into the per-component config values below
//! and passes them into constructors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{ClaimWaitPolicy, ProviderGatewayConfig, ReaperConfig, WebhookVerifierConfig};
use crate::outbound::persistence::PoolConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PROVIDER_URL: &str = "http://localhost:8081/payouts";
/// Secret accepted only when running without a database.
pub const DEV_WEBHOOK_SECRET: &str = "changeme";

/// Invalid or missing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The listener address does not parse as a socket address.
    #[error("invalid bind address {value}: {message}")]
    BindAddr {
        /// Configured text.
        value: String,
        /// Parser diagnostic.
        message: String,
    },
    /// The provider endpoint is not an absolute URL.
    #[error("invalid provider url {value}: {message}")]
    ProviderUrl {
        /// Configured text.
        value: String,
        /// Parser diagnostic.
        message: String,
    },
    /// A database is configured but no webhook secret is.
    #[error("webhook_secret is required when database_url is set")]
    MissingWebhookSecret,
    /// A count or interval that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Setting name.
        field: &'static str,
    },
}

/// Top-level service settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "PAYOUTS")]
pub struct PayoutSettings {
    /// Socket address for the HTTP listener.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub database_max_connections: Option<u32>,
    /// Shared secret for webhook signatures.
    pub webhook_secret: Option<String>,
    /// Accepted webhook clock skew in seconds.
    pub webhook_tolerance_secs: Option<u64>,
    /// Endpoint receiving payout submissions.
    pub provider_url: Option<String>,
    /// Per-attempt provider timeout in milliseconds.
    pub provider_timeout_ms: Option<u64>,
    /// Provider calls per payout, including the first.
    pub provider_max_attempts: Option<u32>,
    /// Base of the exponential retry delay in milliseconds.
    pub provider_backoff_base_ms: Option<u64>,
    /// Cap on the exponential retry delay in milliseconds.
    pub provider_backoff_cap_ms: Option<u64>,
    /// Largest random offset added to a retry delay in milliseconds.
    pub provider_max_jitter_ms: Option<u64>,
    /// Delay between lookups while another request holds a key.
    pub claim_poll_interval_ms: Option<u64>,
    /// How long a losing request waits before answering 409.
    pub claim_deadline_ms: Option<u64>,
    /// Idempotency key retention in seconds.
    pub idempotency_ttl_secs: Option<u64>,
    /// Seconds between idempotency key sweeps.
    pub reaper_interval_secs: Option<u64>,
    /// File holding the session signing key; a temporary key is generated
    /// when absent.
    pub session_key_file: Option<PathBuf>,
    /// Mark the session cookie `Secure`.
    #[ortho_config(default = true)]
    pub session_cookie_secure: bool,
    /// Expose `/auth/dev-login` for local development.
    #[ortho_config(default = false)]
    pub dev_login: bool,
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_secs)
}

impl PayoutSettings {
    /// Listener address.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err: std::net::AddrParseError| SettingsError::BindAddr {
            value: raw.to_owned(),
            message: err.to_string(),
        })
    }

    /// Provider endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::ProviderUrl`] when the value is not a URL.
    pub fn provider_url(&self) -> Result<Url, SettingsError> {
        let raw = self.provider_url.as_deref().unwrap_or(DEFAULT_PROVIDER_URL);
        Url::parse(raw).map_err(|err| SettingsError::ProviderUrl {
            value: raw.to_owned(),
            message: err.to_string(),
        })
    }

    /// Loser wait policy for contended idempotency keys.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Zero`] for a zero poll interval.
    pub fn claim_wait_policy(&self) -> Result<ClaimWaitPolicy, SettingsError> {
        let defaults = ClaimWaitPolicy::default();
        let policy = ClaimWaitPolicy {
            poll_interval: millis(self.claim_poll_interval_ms, defaults.poll_interval),
            deadline: millis(self.claim_deadline_ms, defaults.deadline),
        };
        if policy.poll_interval.is_zero() {
            return Err(SettingsError::Zero {
                field: "claim_poll_interval_ms",
            });
        }
        Ok(policy)
    }

    /// Provider retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Zero`] for zero attempts or a zero timeout.
    pub fn gateway_config(&self) -> Result<ProviderGatewayConfig, SettingsError> {
        let defaults = ProviderGatewayConfig::default();
        let config = ProviderGatewayConfig {
            max_attempts: self.provider_max_attempts.unwrap_or(defaults.max_attempts),
            attempt_timeout: millis(self.provider_timeout_ms, defaults.attempt_timeout),
            backoff_base: millis(self.provider_backoff_base_ms, defaults.backoff_base),
            backoff_cap: millis(self.provider_backoff_cap_ms, defaults.backoff_cap),
            max_jitter: millis(self.provider_max_jitter_ms, defaults.max_jitter),
        };
        if config.max_attempts == 0 {
            return Err(SettingsError::Zero {
                field: "provider_max_attempts",
            });
        }
        if config.attempt_timeout.is_zero() {
            return Err(SettingsError::Zero {
                field: "provider_timeout_ms",
            });
        }
        Ok(config)
    }

    /// Webhook verification settings.
    ///
    /// Without a database the development secret is accepted as a fallback.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingWebhookSecret`] when a database is
    /// configured without a secret.
    pub fn webhook_verifier_config(&self) -> Result<WebhookVerifierConfig, SettingsError> {
        let secret = match (self.webhook_secret.as_deref(), self.database_url.is_some()) {
            (Some(secret), _) if !secret.is_empty() => secret,
            (_, true) => return Err(SettingsError::MissingWebhookSecret),
            (_, false) => DEV_WEBHOOK_SECRET,
        };
        let config = WebhookVerifierConfig::new(secret);
        let tolerance = secs(self.webhook_tolerance_secs, config.tolerance);
        Ok(config.with_tolerance(tolerance))
    }

    /// Idempotency key retention and sweep cadence.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Zero`] for a zero sweep interval, which
    /// `tokio::time::interval` rejects.
    pub fn reaper_config(&self) -> Result<ReaperConfig, SettingsError> {
        let defaults = ReaperConfig::default();
        let config = ReaperConfig {
            ttl: secs(self.idempotency_ttl_secs, defaults.ttl),
            interval: secs(self.reaper_interval_secs, defaults.interval),
        };
        if config.interval.is_zero() {
            return Err(SettingsError::Zero {
                field: "reaper_interval_secs",
            });
        }
        Ok(config)
    }

    /// Pool settings when a database is configured.
    ///
    /// The checkout timeout matches the claim deadline so a starved pool
    /// surfaces as 503 instead of outliving waiting requests.
    #[must_use]
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self.database_url.as_deref()?;
        let mut config = PoolConfig::new(url).with_connection_timeout(millis(
            self.claim_deadline_ms,
            ClaimWaitPolicy::default().deadline,
        ));
        if let Some(max) = self.database_max_connections {
            config = config.with_max_size(max);
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing and conversion.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 8] = [
        "PAYOUTS_BIND_ADDR",
        "PAYOUTS_DATABASE_URL",
        "PAYOUTS_WEBHOOK_SECRET",
        "PAYOUTS_PROVIDER_URL",
        "PAYOUTS_PROVIDER_MAX_ATTEMPTS",
        "PAYOUTS_CLAIM_DEADLINE_MS",
        "PAYOUTS_DEV_LOGIN",
        "PAYOUTS_SESSION_COOKIE_SECURE",
    ];

    fn env_with(overrides: &[(&str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    fn load_from_empty_args() -> PayoutSettings {
        PayoutSettings::load_from_iter([OsString::from("payouts")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = lock_env(env_with(&[]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("literal addr")
        );
        assert_eq!(
            settings.provider_url().expect("url").as_str(),
            DEFAULT_PROVIDER_URL
        );
        assert_eq!(
            settings.claim_wait_policy().expect("policy"),
            ClaimWaitPolicy::default()
        );
        assert_eq!(
            settings.gateway_config().expect("gateway"),
            ProviderGatewayConfig::default()
        );
        assert_eq!(settings.reaper_config().expect("reaper"), ReaperConfig::default());
        assert!(settings.pool_config().is_none());
        assert!(!settings.dev_login);
        assert!(settings.session_cookie_secure);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(env_with(&[
            ("PAYOUTS_BIND_ADDR", "127.0.0.1:9000"),
            ("PAYOUTS_PROVIDER_MAX_ATTEMPTS", "2"),
            ("PAYOUTS_CLAIM_DEADLINE_MS", "1500"),
            ("PAYOUTS_DEV_LOGIN", "true"),
        ]));

        let settings = load_from_empty_args();

        assert_eq!(settings.bind_addr().expect("bind addr").port(), 9000);
        assert_eq!(settings.gateway_config().expect("gateway").max_attempts, 2);
        assert_eq!(
            settings.claim_wait_policy().expect("policy").deadline,
            Duration::from_millis(1500)
        );
        assert!(settings.dev_login);
    }

    #[rstest]
    fn database_requires_a_webhook_secret() {
        let _guard = lock_env(env_with(&[(
            "PAYOUTS_DATABASE_URL",
            "postgres://localhost/payouts",
        )]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.webhook_verifier_config().map(|_| ()),
            Err(SettingsError::MissingWebhookSecret)
        );
        let pool = settings.pool_config().expect("pool config");
        assert_eq!(pool.connection_timeout(), Duration::from_secs(3));
    }

    #[rstest]
    fn development_secret_is_used_without_a_database() {
        let _guard = lock_env(env_with(&[]));

        let config = load_from_empty_args()
            .webhook_verifier_config()
            .expect("verifier config");

        assert_eq!(config.secret.as_str(), DEV_WEBHOOK_SECRET);
        assert_eq!(config.tolerance, Duration::from_secs(300));
    }

    #[rstest]
    #[case("PAYOUTS_BIND_ADDR", "not-an-address")]
    #[case("PAYOUTS_PROVIDER_URL", "::nope")]
    #[case("PAYOUTS_PROVIDER_MAX_ATTEMPTS", "0")]
    fn invalid_values_are_reported(#[case] var: &'static str, #[case] value: &str) {
        let _guard = lock_env(env_with(&[(var, value)]));

        let settings = load_from_empty_args();

        let failed = settings.bind_addr().is_err()
            || settings.provider_url().is_err()
            || settings.gateway_config().is_err();
        assert!(failed, "{var}={value} should be rejected");
    }
}
