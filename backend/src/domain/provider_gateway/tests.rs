//! Unit tests for the provider retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rstest::{fixture, rstest};
use rust_decimal_macros::dec;

use super::{ProviderGateway, ProviderGatewayConfig, ProviderGatewayRuntime, SubmissionOutcome};
use crate::domain::ports::{
    MockPayoutLedger, PaymentProviderError, PayoutLedgerError, ProviderAcceptance,
};
use crate::domain::{Amount, CorrelationId, Currency, Payout, PayoutId, PayoutStatus, UserId};
use crate::test_support::provider::{
    ImmediateSleeper, MaxJitter, NoJitter, RecordingSleeper, ScriptedProvider,
};

#[fixture]
fn payout() -> Payout {
    let now = Utc::now();
    Payout {
        id: PayoutId::new(42),
        user_id: UserId::random(),
        amount: Amount::new(dec!(10.00)).expect("valid amount"),
        currency: Currency::Usd,
        status: PayoutStatus::Processing,
        provider_ref: None,
        created_at: now,
        updated_at: now,
    }
}

/// Ledger expecting one reference write, which it fails; the gateway must
/// still report acceptance.
fn ledger_expecting_ref(reference: &'static str) -> MockPayoutLedger {
    let mut ledger = MockPayoutLedger::new();
    ledger
        .expect_set_provider_ref()
        .withf(move |id, provider_ref| *id == PayoutId::new(42) && provider_ref == reference)
        .times(1)
        .returning(|_, _| Err(PayoutLedgerError::not_found(42_i64)));
    ledger
}

fn ledger_untouched() -> MockPayoutLedger {
    let mut ledger = MockPayoutLedger::new();
    ledger.expect_set_provider_ref().never();
    ledger
}

fn gateway(
    provider: Arc<ScriptedProvider>,
    ledger: MockPayoutLedger,
    sleeper: Arc<RecordingSleeper>,
) -> ProviderGateway {
    ProviderGateway::with_runtime(
        provider,
        Arc::new(ledger),
        ProviderGatewayRuntime {
            sleeper,
            jitter: Arc::new(NoJitter),
        },
        ProviderGatewayConfig::default(),
    )
}

fn accepted(reference: &str) -> Result<ProviderAcceptance, PaymentProviderError> {
    Ok(ProviderAcceptance {
        reference: reference.to_owned(),
    })
}

#[rstest]
#[tokio::test]
async fn always_failing_provider_is_called_exactly_four_times(payout: Payout) {
    let provider = Arc::new(ScriptedProvider::always_failing(
        PaymentProviderError::server_error(500_u16, "boom"),
    ));
    let sleeper = Arc::new(RecordingSleeper::default());
    let gateway = gateway(provider.clone(), ledger_untouched(), sleeper.clone());

    let outcome = gateway.submit(&payout, None).await;

    assert_eq!(provider.calls(), 4);
    assert!(matches!(outcome, SubmissionOutcome::Exhausted { attempts: 4, .. }));
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ],
        "no delay follows the final attempt"
    );
}

#[rstest]
#[tokio::test]
async fn success_after_transient_failures_records_reference(payout: Payout) {
    let provider = Arc::new(ScriptedProvider::scripted(vec![
        Err(PaymentProviderError::rate_limited("429")),
        Err(PaymentProviderError::transport("connection reset")),
        accepted("prov_abc"),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let gateway = gateway(provider.clone(), ledger_expecting_ref("prov_abc"), sleeper.clone());

    let outcome = gateway.submit(&payout, None).await;

    assert_eq!(
        outcome,
        SubmissionOutcome::Accepted {
            reference: "prov_abc".to_owned(),
            attempts: 3,
        }
    );
    assert_eq!(provider.calls(), 3);
    assert_eq!(sleeper.recorded().len(), 2);
}

#[rstest]
#[case(PaymentProviderError::rejected(400_u16, "bad request"))]
#[case(PaymentProviderError::rejected(503_u16, "unavailable"))]
#[case(PaymentProviderError::decode("missing reference"))]
#[tokio::test]
async fn terminal_errors_stop_without_backoff(
    payout: Payout,
    #[case] error: PaymentProviderError,
) {
    let provider = Arc::new(ScriptedProvider::always_failing(error.clone()));
    let sleeper = Arc::new(RecordingSleeper::default());
    let gateway = gateway(provider.clone(), ledger_untouched(), sleeper.clone());

    let outcome = gateway.submit(&payout, None).await;

    assert_eq!(outcome, SubmissionOutcome::Rejected { attempts: 1, error });
    assert_eq!(provider.calls(), 1);
    assert!(sleeper.recorded().is_empty());
}

#[rstest]
#[tokio::test]
async fn request_carries_reference_and_correlation_id(payout: Payout) {
    let provider = Arc::new(ScriptedProvider::accepting());
    let mut ledger = MockPayoutLedger::new();
    let stored = payout.clone();
    ledger
        .expect_set_provider_ref()
        .withf(|id, provider_ref| *id == PayoutId::new(42) && provider_ref == "payout_42")
        .times(1)
        .returning(move |_, _| Ok(stored.clone()));
    let gateway = ProviderGateway::with_runtime(
        provider.clone(),
        Arc::new(ledger),
        ProviderGatewayRuntime {
            sleeper: Arc::new(ImmediateSleeper),
            jitter: Arc::new(NoJitter),
        },
        ProviderGatewayConfig::default(),
    );
    let correlation_id = CorrelationId::generate();

    gateway.submit(&payout, Some(correlation_id)).await;

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].reference, "payout_42");
    assert_eq!(requests[0].correlation_id, Some(correlation_id));
    assert_eq!(requests[0].amount.to_string(), "10.00");
}

#[rstest]
#[tokio::test]
async fn empty_reference_is_a_terminal_decode_error(payout: Payout) {
    let provider = Arc::new(ScriptedProvider::scripted(vec![accepted("   ")]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let gateway = gateway(provider.clone(), ledger_untouched(), sleeper);

    let outcome = gateway.submit(&payout, None).await;

    assert!(matches!(
        outcome,
        SubmissionOutcome::Rejected {
            attempts: 1,
            error: PaymentProviderError::Decode { .. }
        }
    ));
}

#[rstest]
#[tokio::test]
async fn jitter_is_added_to_each_delay(payout: Payout) {
    let provider = Arc::new(ScriptedProvider::always_failing(
        PaymentProviderError::timeout("slow"),
    ));
    let sleeper = Arc::new(RecordingSleeper::default());
    let gateway = ProviderGateway::with_runtime(
        provider,
        Arc::new(ledger_untouched()),
        ProviderGatewayRuntime {
            sleeper: sleeper.clone(),
            jitter: Arc::new(MaxJitter),
        },
        ProviderGatewayConfig::default(),
    );

    gateway.submit(&payout, None).await;

    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_millis(1_250),
            Duration::from_millis(2_250),
            Duration::from_millis(4_250),
        ]
    );
}

#[rstest]
#[case(1, Duration::from_secs(1))]
#[case(2, Duration::from_secs(2))]
#[case(3, Duration::from_secs(4))]
#[case(4, Duration::from_secs(5))]
#[case(30, Duration::from_secs(5))]
fn backoff_is_exponential_and_capped(#[case] attempt: u32, #[case] expected: Duration) {
    assert_eq!(ProviderGatewayConfig::default().backoff_delay(attempt), expected);
}

#[test]
fn worst_case_latency_is_documented_bound() {
    assert_eq!(
        ProviderGatewayConfig::default().worst_case_latency(),
        Duration::from_millis(27_750)
    );
}
