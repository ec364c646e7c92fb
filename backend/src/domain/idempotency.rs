//! Idempotency primitives for exactly-once payout creation.
//!
//! This module provides the types the claim protocol is expressed in:
//!
//! - [`IdempotencyKey`]: validated client token sent via the
//!   `Idempotency-Key` HTTP header.
//! - [`ClaimOutcome`]: result of the atomic insert-if-absent on a key.
//! - [`IdempotencyKeyRecord`]: stored row linking a key to its owner and,
//!   once attached, its payout.
//! - [`ClaimWaitPolicy`]: how long a losing request waits for the winner.
//!
//! # Protocol
//!
//! Exactly one concurrent caller observes [`ClaimOutcome::Won`] for a key.
//! The winner attaches the created payout id exactly once; the attachment is
//! never cleared or changed afterwards. Losers poll the record until the id
//! appears or the wait deadline elapses.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PayoutId, UserId};

/// Maximum accepted key length, matching the storage column width.
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 128;

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty or whitespace.
    #[error("idempotency key must not be empty")]
    EmptyKey,
    /// The key exceeded [`IDEMPOTENCY_KEY_MAX_LEN`] characters.
    #[error("idempotency key must be at most {max} characters")]
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The key contained whitespace or non-printable characters.
    #[error("idempotency key must contain only visible ASCII characters")]
    InvalidCharacters,
}

/// Client-provided idempotency key.
///
/// Any visible ASCII token up to [`IDEMPOTENCY_KEY_MAX_LEN`] characters is
/// accepted, so clients may send UUIDs or their own opaque tokens.
///
/// # Example
///
/// ```
/// # use payouts::domain::IdempotencyKey;
/// let key = IdempotencyKey::new("k1").expect("valid key");
/// assert_eq!(key.as_ref(), "k1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validate and construct an [`IdempotencyKey`].
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError`] when the input is empty, too
    /// long, or contains characters outside visible ASCII.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        let key = raw.into();
        if key.trim().is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.len() > IDEMPOTENCY_KEY_MAX_LEN {
            return Err(IdempotencyKeyValidationError::TooLong {
                max: IDEMPOTENCY_KEY_MAX_LEN,
            });
        }
        if !key.bytes().all(|byte| byte.is_ascii_graphic()) {
            return Err(IdempotencyKeyValidationError::InvalidCharacters);
        }
        Ok(Self(key))
    }

    /// Generate a random key; primarily useful in tests.
    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Outcome of the atomic claim on an idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller inserted the key and owns payout creation.
    Won,
    /// Another caller already holds the key.
    Lost,
}

/// Stored idempotency record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKeyRecord {
    /// The idempotency key provided by the client.
    pub key: IdempotencyKey,
    /// User who claimed the key.
    pub owner: UserId,
    /// Payout created by the winning request, once attached.
    pub payout_id: Option<PayoutId>,
    /// When the key was claimed.
    pub created_at: DateTime<Utc>,
}

/// Wait policy applied by requests that lose the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimWaitPolicy {
    /// Delay between lookups of the claimed key.
    pub poll_interval: Duration,
    /// Total time to wait for the winner before reporting "processing".
    pub deadline: Duration,
}

impl ClaimWaitPolicy {
    /// Number of lookups performed after the initial one.
    ///
    /// The bound is derived from the deadline rather than a wall clock so the
    /// wait stays bounded regardless of the sleeper in use.
    #[must_use]
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        self.deadline
            .as_millis()
            .checked_div(interval)
            .and_then(|polls| u32::try_from(polls).ok())
            .unwrap_or(u32::MAX)
    }
}

impl Default for ClaimWaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            deadline: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("k1")]
    #[case("550e8400-e29b-41d4-a716-446655440000")]
    #[case("order:42/retry-1")]
    fn accepts_opaque_tokens(#[case] input: &str) {
        let key = IdempotencyKey::new(input).expect("key should validate");
        assert_eq!(key.as_ref(), input);
    }

    #[rstest]
    #[case("", IdempotencyKeyValidationError::EmptyKey)]
    #[case("   ", IdempotencyKeyValidationError::EmptyKey)]
    #[case("has space", IdempotencyKeyValidationError::InvalidCharacters)]
    #[case("tab\tkey", IdempotencyKeyValidationError::InvalidCharacters)]
    fn rejects_invalid_tokens(#[case] input: &str, #[case] expected: IdempotencyKeyValidationError) {
        assert_eq!(IdempotencyKey::new(input), Err(expected));
    }

    #[test]
    fn rejects_keys_longer_than_column() {
        let long = "k".repeat(IDEMPOTENCY_KEY_MAX_LEN + 1);
        assert!(matches!(
            IdempotencyKey::new(long),
            Err(IdempotencyKeyValidationError::TooLong { max: IDEMPOTENCY_KEY_MAX_LEN })
        ));
    }

    #[test]
    fn default_wait_policy_polls_sixty_times() {
        assert_eq!(ClaimWaitPolicy::default().max_polls(), 60);
    }

    #[rstest]
    #[case(Duration::from_millis(50), Duration::from_millis(120), 2)]
    #[case(Duration::from_millis(50), Duration::from_millis(49), 0)]
    #[case(Duration::ZERO, Duration::from_millis(7), 7)]
    #[case(Duration::from_millis(1), Duration::from_secs(u64::MAX), u32::MAX)]
    fn max_polls_rounds_down_and_saturates(
        #[case] poll_interval: Duration,
        #[case] deadline: Duration,
        #[case] expected: u32,
    ) {
        let policy = ClaimWaitPolicy {
            poll_interval,
            deadline,
        };
        assert_eq!(policy.max_polls(), expected);
    }
}
