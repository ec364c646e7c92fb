//! Payout ledger model.
//!
//! A payout is created in [`PayoutStatus::Processing`], may have a provider
//! reference recorded while still processing, and reaches a terminal status
//! only through webhook confirmation. Records are never deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Ledger identifier for a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutId(i64);

impl PayoutId {
    /// Wrap a storage-assigned identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Reference sent to the provider when submitting this payout.
    ///
    /// ```
    /// # use payouts::domain::PayoutId;
    /// assert_eq!(PayoutId::new(7).provider_reference(), "payout_7");
    /// ```
    #[must_use]
    pub fn provider_reference(self) -> String {
        format!("payout_{}", self.0)
    }
}

impl fmt::Display for PayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation failures for payout input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutValidationError {
    /// Amount was zero or negative after rounding.
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    /// Amount does not fit the ledger's fixed-point column.
    #[error("amount must be less than {max}")]
    AmountTooLarge {
        /// Exclusive upper bound.
        max: Decimal,
    },
    /// Currency is not on the whitelist.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    /// Status string is not a known payout status.
    #[error("unknown payout status: {0}")]
    UnknownStatus(String),
}

/// Supported payout currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Euro.
    Eur,
    /// Pound sterling.
    Gbp,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }
}

impl FromStr for Currency {
    type Err = PayoutValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            other => Err(PayoutValidationError::UnsupportedCurrency(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = PayoutValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for &'static str {
    fn from(value: Currency) -> Self {
        value.code()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Positive money amount with two-digit currency precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Quantize `raw` to two decimal places (half away from zero) and
    /// validate it.
    ///
    /// # Errors
    ///
    /// Returns [`PayoutValidationError`] when the rounded amount is not
    /// positive or exceeds the ledger column.
    ///
    /// ```
    /// # use payouts::domain::Amount;
    /// # use rust_decimal::Decimal;
    /// let amount = Amount::new(Decimal::new(10005, 3)).expect("valid");
    /// assert_eq!(amount.to_string(), "10.01");
    /// ```
    pub fn new(raw: Decimal) -> Result<Self, PayoutValidationError> {
        let mut value = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if value <= Decimal::ZERO {
            return Err(PayoutValidationError::NonPositiveAmount);
        }
        let max = Self::exclusive_max();
        if value >= max {
            return Err(PayoutValidationError::AmountTooLarge { max });
        }
        value.rescale(2);
        Ok(Self(value))
    }

    /// Exclusive upper bound imposed by the `NUMERIC(12, 2)` column.
    #[must_use]
    pub fn exclusive_max() -> Decimal {
        Decimal::from(10_000_000_000_i64)
    }

    /// Underlying decimal value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payout lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Created and awaiting provider confirmation.
    Processing,
    /// Provider confirmed the payout.
    Paid,
    /// Provider reported the payout failed.
    Failed,
}

/// Result of applying a requested status to a current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// The status changes to the requested value.
    Apply,
    /// The payout is already in the requested status.
    Unchanged,
    /// The change would leave a terminal state and is ignored.
    Rejected,
}

impl PayoutStatus {
    /// Storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }

    /// Decide how a requested status applies to this one.
    ///
    /// Only `processing → paid` and `processing → failed` change state.
    ///
    /// ```
    /// # use payouts::domain::{PayoutStatus, StatusTransition};
    /// assert_eq!(
    ///     PayoutStatus::Paid.transition_to(PayoutStatus::Processing),
    ///     StatusTransition::Rejected
    /// );
    /// ```
    #[must_use]
    pub const fn transition_to(self, next: Self) -> StatusTransition {
        match (self, next) {
            (Self::Processing, Self::Processing)
            | (Self::Paid, Self::Paid)
            | (Self::Failed, Self::Failed) => StatusTransition::Unchanged,
            (Self::Processing, Self::Paid | Self::Failed) => StatusTransition::Apply,
            (Self::Paid | Self::Failed, _) => StatusTransition::Rejected,
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = PayoutValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(PayoutValidationError::UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical payout record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    /// Ledger identifier.
    pub id: PayoutId,
    /// Owning user.
    pub user_id: UserId,
    /// Amount paid out.
    pub amount: Amount,
    /// Currency of the amount.
    pub currency: Currency,
    /// Lifecycle status.
    pub status: PayoutStatus,
    /// Provider reference recorded after a successful submission.
    pub provider_ref: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// Apply `next` under the monotonic transition rule, stamping
    /// `updated_at` only when the status changes.
    pub fn apply_status(&mut self, next: PayoutStatus, now: DateTime<Utc>) -> StatusUpdate {
        match self.status.transition_to(next) {
            StatusTransition::Apply => {
                self.status = next;
                self.updated_at = now;
                StatusUpdate::Applied(self.clone())
            }
            StatusTransition::Unchanged => StatusUpdate::Unchanged(self.clone()),
            StatusTransition::Rejected => StatusUpdate::Rejected {
                current: self.status,
                requested: next,
            },
        }
    }
}

/// Validated input for creating a payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayout {
    /// Owning user.
    pub user_id: UserId,
    /// Amount to pay out.
    pub amount: Amount,
    /// Currency of the amount.
    pub currency: Currency,
}

/// Result of [`crate::domain::ports::PayoutLedger::update_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The status changed; carries the updated record.
    Applied(Payout),
    /// The payout already had the requested status.
    Unchanged(Payout),
    /// The transition would regress from a terminal status.
    Rejected {
        /// Status left in place.
        current: PayoutStatus,
        /// Status that was refused.
        requested: PayoutStatus,
    },
}

/// One page of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

/// Validation failures for [`PageRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageRequestError {
    /// Pages are 1-indexed.
    #[error("page must be at least 1")]
    PageOutOfRange,
    /// Limit must lie within `1..=MAX_LIMIT`.
    #[error("limit must be between 1 and {max}")]
    LimitOutOfRange {
        /// Largest accepted limit.
        max: u32,
    },
}

impl PageRequest {
    /// Largest page size a client may request.
    pub const MAX_LIMIT: u32 = 100;
    /// Page size used when the client does not specify one.
    pub const DEFAULT_LIMIT: u32 = 20;

    /// Validate a page window.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError`] for a zero page or an out-of-range limit.
    pub fn new(page: u32, limit: u32) -> Result<Self, PageRequestError> {
        if page == 0 {
            return Err(PageRequestError::PageOutOfRange);
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(PageRequestError::LimitOutOfRange {
                max: Self::MAX_LIMIT,
            });
        }
        Ok(Self { page, limit })
    }

    /// 1-indexed page number.
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Page size.
    #[must_use]
    pub const fn limit(self) -> u32 {
        self.limit
    }

    /// Number of rows skipped before this page.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// A page of payouts ordered by id descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutPage {
    /// Window that produced this page.
    pub request: PageRequest,
    /// Count of all payouts matching the query, independent of the window.
    pub total: u64,
    /// Payouts in this window, most recent first.
    pub items: Vec<Payout>,
}
