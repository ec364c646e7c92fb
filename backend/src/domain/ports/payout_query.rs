//! Driving port for the payout listing read path.

use async_trait::async_trait;

use crate::domain::{Error, PageRequest, PayoutPage, UserId};

/// Request for one page of the caller's payouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPayoutsRequest {
    /// Authenticated caller; only their payouts are listed.
    pub user_id: UserId,
    /// Validated page window.
    pub page: PageRequest,
}

/// Driving port for payout reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayoutQuery: Send + Sync {
    /// List payouts ordered by id descending.
    async fn list_payouts(&self, request: ListPayoutsRequest) -> Result<PayoutPage, Error>;
}

/// Fixture query returning empty pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePayoutQuery;

#[async_trait]
impl PayoutQuery for FixturePayoutQuery {
    async fn list_payouts(&self, request: ListPayoutsRequest) -> Result<PayoutPage, Error> {
        Ok(PayoutPage {
            request: request.page,
            total: 0,
            items: Vec::new(),
        })
    }
}
