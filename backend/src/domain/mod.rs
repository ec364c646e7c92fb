//! Domain primitives, ports, and services.
//!
//! Purpose: define strongly typed payout entities and the services that
//! coordinate them, independent of HTTP and storage. Adapters depend on this
//! module; it depends on none of them.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - IdempotencyKey, ClaimOutcome, ClaimWaitPolicy: claim protocol types.
//! - Payout, PayoutStatus, Amount, Currency: ledger model.
//! - WebhookVerifier, WebhookPayload: signed callback handling.
//! - PayoutOrchestrator, ProviderGateway, WebhookReconciler,
//!   PayoutQueryService, IdempotencyReaper: services behind the ports.

pub mod correlation_id;
pub mod error;
pub mod idempotency;
pub mod idempotency_reaper;
pub mod payout;
pub mod payout_orchestrator;
pub mod payout_query_service;
pub mod ports;
pub mod provider_gateway;
pub mod user;
pub mod webhook;
pub mod webhook_reconciler;

pub use self::correlation_id::{CORRELATION_ID_HEADER, CorrelationId};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::idempotency::{
    ClaimOutcome, ClaimWaitPolicy, IDEMPOTENCY_KEY_MAX_LEN, IdempotencyKey,
    IdempotencyKeyRecord, IdempotencyKeyValidationError,
};
pub use self::idempotency_reaper::{IdempotencyReaper, ReaperConfig, ReaperHandle};
pub use self::payout::{
    Amount, Currency, NewPayout, PageRequest, PageRequestError, Payout, PayoutId, PayoutPage,
    PayoutStatus, PayoutValidationError, StatusTransition, StatusUpdate,
};
pub use self::payout_orchestrator::PayoutOrchestrator;
pub use self::payout_query_service::PayoutQueryService;
pub use self::provider_gateway::{
    BackoffJitter, ProviderGateway, ProviderGatewayConfig, ProviderGatewayRuntime,
    RetrySleeper, SubmissionOutcome, TokioSleeper, UniformJitter,
};
pub use self::user::{UserId, UserIdValidationError};
pub use self::webhook::{
    SignedTimestamp, WEBHOOK_EVENT_ID_MAX_LEN, WebhookApplyOutcome, WebhookEvent, WebhookPayload,
    WebhookStatusUpdate, WebhookVerificationError, WebhookVerifier, WebhookVerifierConfig,
};
pub use self::webhook_reconciler::WebhookReconciler;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use payouts::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// # assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
