//! Provider webhook primitives: signed delivery verification, payload
//! parsing, and reconciliation outcomes.
//!
//! A delivery carries `x-sig` and `x-sig-ts` headers. The signature is the
//! lowercase hex HMAC-SHA256 of `"{timestamp}.{raw_body}"` keyed with the
//! shared webhook secret.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{PayoutId, PayoutStatus, StatusUpdate};

type HmacSha256 = Hmac<Sha256>;

/// Verification settings for inbound provider webhooks.
#[derive(Clone)]
pub struct WebhookVerifierConfig {
    /// Shared secret used to sign deliveries.
    pub secret: Zeroizing<String>,
    /// Maximum accepted distance between the signed timestamp and now.
    pub tolerance: Duration,
}

impl WebhookVerifierConfig {
    /// Build a config with the default five minute tolerance.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            tolerance: Duration::from_secs(300),
        }
    }

    /// Override the staleness tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl fmt::Debug for WebhookVerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifierConfig")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

/// Longest event id the event table accepts.
pub const WEBHOOK_EVENT_ID_MAX_LEN: usize = 128;

/// Reasons a delivery fails verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookVerificationError {
    /// The timestamp header is not an integer count of seconds.
    #[error("x-sig-ts must be an integer unix timestamp")]
    MalformedTimestamp,
    /// The signed timestamp lies outside the tolerance window.
    #[error("stale signature")]
    Stale {
        /// Absolute skew observed, in seconds.
        skew_secs: u64,
    },
    /// The signature does not match the body.
    #[error("bad signature")]
    BadSignature,
    /// The secret could not key the MAC.
    #[error("webhook secret is unusable")]
    InvalidSecret,
}

/// The `x-sig-ts` header as sent, with its parsed value.
///
/// The MAC covers the header text, so senders need not render the number
/// canonically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTimestamp {
    header: String,
    seconds: i64,
}

impl SignedTimestamp {
    /// Parse a trimmed header value.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookVerificationError::MalformedTimestamp`] when the
    /// header is not an integer.
    ///
    /// ```
    /// # use payouts::domain::SignedTimestamp;
    /// let ts = SignedTimestamp::parse(" 01700000000 ").expect("integer");
    /// assert_eq!(ts.header(), "01700000000");
    /// assert_eq!(ts.seconds(), 1_700_000_000);
    /// ```
    pub fn parse(header: &str) -> Result<Self, WebhookVerificationError> {
        let trimmed = header.trim();
        let seconds = trimmed
            .parse::<i64>()
            .map_err(|_| WebhookVerificationError::MalformedTimestamp)?;
        Ok(Self {
            header: trimmed.to_owned(),
            seconds,
        })
    }

    /// Header text covered by the signature.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Parsed Unix seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }
}

impl From<i64> for SignedTimestamp {
    fn from(seconds: i64) -> Self {
        Self {
            header: seconds.to_string(),
            seconds,
        }
    }
}

/// Verifies signed webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    config: WebhookVerifierConfig,
}

impl WebhookVerifier {
    /// Create a verifier from configuration.
    #[must_use]
    pub const fn new(config: WebhookVerifierConfig) -> Self {
        Self { config }
    }

    /// Compute the hex signature of `raw` under the `timestamp` header text.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookVerificationError::InvalidSecret`] if the MAC cannot
    /// be keyed.
    ///
    /// ```
    /// # use payouts::domain::{SignedTimestamp, WebhookVerifier, WebhookVerifierConfig};
    /// let verifier = WebhookVerifier::new(WebhookVerifierConfig::new("secret"));
    /// let signature = verifier
    ///     .sign(&SignedTimestamp::from(1_700_000_000), b"{}")
    ///     .expect("sign");
    /// assert_eq!(signature.len(), 64);
    /// ```
    pub fn sign(
        &self,
        timestamp: &SignedTimestamp,
        raw: &[u8],
    ) -> Result<String, WebhookVerificationError> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|_| WebhookVerificationError::InvalidSecret)?;
        mac.update(timestamp.header().as_bytes());
        mac.update(b".");
        mac.update(raw);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Reject timestamps outside the tolerance window.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookVerificationError::Stale`] with the observed skew.
    pub fn ensure_fresh(
        &self,
        timestamp: &SignedTimestamp,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookVerificationError> {
        let skew_secs = now.timestamp().abs_diff(timestamp.seconds());
        if skew_secs > self.config.tolerance.as_secs() {
            return Err(WebhookVerificationError::Stale { skew_secs });
        }
        Ok(())
    }

    /// Check freshness first, then the signature in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookVerificationError::Stale`] when the timestamp is
    /// outside the tolerance window and
    /// [`WebhookVerificationError::BadSignature`] on mismatch.
    pub fn verify(
        &self,
        raw: &[u8],
        signature: &str,
        timestamp: &SignedTimestamp,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookVerificationError> {
        self.ensure_fresh(timestamp, now)?;

        let expected = self.sign(timestamp, raw)?;
        let matches: bool = expected.as_bytes().ct_eq(signature.trim().as_bytes()).into();
        if matches {
            Ok(())
        } else {
            Err(WebhookVerificationError::BadSignature)
        }
    }
}

/// Body of a provider status callback.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookPayload {
    /// Provider event identifier used for deduplication.
    pub event_id: String,
    /// Provider reference of the affected payout.
    pub payout_ref: String,
    /// Status reported by the provider; unknown values are ignored.
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookPayload {
    /// Reported status when it names a known payout status.
    #[must_use]
    pub fn known_status(&self) -> Option<PayoutStatus> {
        self.status.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// A verified delivery to persist exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Provider event identifier.
    pub event_id: String,
    /// Raw body as delivered.
    pub raw_payload: String,
    /// Receipt timestamp.
    pub received_at: DateTime<Utc>,
}

/// Status change requested by a webhook, resolved against `provider_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookStatusUpdate {
    /// Provider reference to match.
    pub provider_ref: String,
    /// Requested status, if the provider sent a known one.
    pub status: Option<PayoutStatus>,
}

/// What recording and applying one delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookApplyOutcome {
    /// The event id was already recorded; nothing changed.
    Duplicate,
    /// The payout moved to a new status.
    Applied {
        /// Affected payout.
        payout_id: PayoutId,
        /// Status after the update.
        status: PayoutStatus,
    },
    /// The payout already had the reported status.
    Unchanged {
        /// Affected payout.
        payout_id: PayoutId,
    },
    /// The reported status would regress a terminal payout.
    Rejected {
        /// Affected payout.
        payout_id: PayoutId,
        /// Status left in place.
        current: PayoutStatus,
        /// Status that was refused.
        requested: PayoutStatus,
    },
    /// No payout carries the reported provider reference.
    UnknownPayout,
    /// The reported status is not one the ledger understands.
    UnknownStatus,
}

impl WebhookApplyOutcome {
    /// Translate a ledger status update for `payout_id`.
    #[must_use]
    pub fn from_status_update(payout_id: PayoutId, update: StatusUpdate) -> Self {
        match update {
            StatusUpdate::Applied(payout) => Self::Applied {
                payout_id,
                status: payout.status,
            },
            StatusUpdate::Unchanged(_) => Self::Unchanged { payout_id },
            StatusUpdate::Rejected { current, requested } => Self::Rejected {
                payout_id,
                current,
                requested,
            },
        }
    }
}
