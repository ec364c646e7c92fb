//! Read path listing a user's payouts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::Error;
use super::payout_orchestrator::STORAGE_UNAVAILABLE_MESSAGE;
use super::ports::{ListPayoutsRequest, PayoutLedger, PayoutLedgerError, PayoutQuery};
use super::PayoutPage;

fn map_ledger_error(error: PayoutLedgerError) -> Error {
    match error {
        PayoutLedgerError::Connection { message } => {
            error!(error = %message, "payout ledger unavailable");
            Error::service_unavailable(STORAGE_UNAVAILABLE_MESSAGE)
        }
        other => Error::internal(format!("payout ledger error: {other}")),
    }
}

/// Concrete implementation of [`PayoutQuery`] backed by the ledger.
#[derive(Clone)]
pub struct PayoutQueryService {
    ledger: Arc<dyn PayoutLedger>,
}

impl PayoutQueryService {
    /// Create a query service over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn PayoutLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl PayoutQuery for PayoutQueryService {
    async fn list_payouts(&self, request: ListPayoutsRequest) -> Result<PayoutPage, Error> {
        self.ledger
            .list(&request.user_id, request.page)
            .await
            .map_err(map_ledger_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockPayoutLedger;
    use crate::domain::{ErrorCode, PageRequest, UserId};

    #[tokio::test]
    async fn list_forwards_the_window_and_owner() {
        let user_id = UserId::random();
        let expected_user = user_id.clone();
        let mut ledger = MockPayoutLedger::new();
        ledger
            .expect_list()
            .withf(move |user, page| *user == expected_user && page.page() == 2 && page.limit() == 5)
            .times(1)
            .return_once(|_, page| {
                Ok(PayoutPage {
                    request: page,
                    total: 6,
                    items: Vec::new(),
                })
            });

        let page = PayoutQueryService::new(Arc::new(ledger))
            .list_payouts(ListPayoutsRequest {
                user_id,
                page: PageRequest::new(2, 5).expect("valid window"),
            })
            .await
            .expect("list succeeds");

        assert_eq!(page.total, 6);
    }

    #[tokio::test]
    async fn ledger_failures_are_internal_errors() {
        let mut ledger = MockPayoutLedger::new();
        ledger
            .expect_list()
            .return_once(|_, _| Err(PayoutLedgerError::query("syntax error")));

        let err = PayoutQueryService::new(Arc::new(ledger))
            .list_payouts(ListPayoutsRequest {
                user_id: UserId::random(),
                page: PageRequest::default(),
            })
            .await
            .expect_err("query failure surfaces");

        assert_eq!(err.code(), ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn ledger_outage_hides_driver_detail() {
        let mut ledger = MockPayoutLedger::new();
        ledger
            .expect_list()
            .return_once(|_, _| Err(PayoutLedgerError::connection("password authentication failed")));

        let err = PayoutQueryService::new(Arc::new(ledger))
            .list_payouts(ListPayoutsRequest {
                user_id: UserId::random(),
                page: PageRequest::default(),
            })
            .await
            .expect_err("outage surfaces");

        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
        assert_eq!(err.message(), STORAGE_UNAVAILABLE_MESSAGE);
    }
}
