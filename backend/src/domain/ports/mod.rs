//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`IdempotencyKeyStore`, `PayoutLedger`, `WebhookEventStore`,
//! `PaymentProvider`) are implemented by outbound adapters. Driving ports
//! (`PayoutCommand`, `PayoutQuery`, `WebhookCommand`) are implemented by
//! domain services and consumed by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod idempotency_key_store;
mod payment_provider;
mod payout_command;
mod payout_ledger;
mod payout_query;
mod webhook_command;
mod webhook_event_store;

#[cfg(test)]
pub use idempotency_key_store::MockIdempotencyKeyStore;
pub use idempotency_key_store::{
    FixtureIdempotencyKeyStore, IdempotencyKeyStore, IdempotencyKeyStoreError,
};
#[cfg(test)]
pub use payment_provider::MockPaymentProvider;
pub use payment_provider::{
    FixturePaymentProvider, PaymentProvider, PaymentProviderError, ProviderAcceptance,
    ProviderPayoutRequest,
};
#[cfg(test)]
pub use payout_command::MockPayoutCommand;
pub use payout_command::{
    CreatePayoutRequest, CreatePayoutResponse, FixturePayoutCommand, PayoutCommand,
};
#[cfg(test)]
pub use payout_ledger::MockPayoutLedger;
pub use payout_ledger::{FixturePayoutLedger, PayoutLedger, PayoutLedgerError};
#[cfg(test)]
pub use payout_query::MockPayoutQuery;
pub use payout_query::{FixturePayoutQuery, ListPayoutsRequest, PayoutQuery};
#[cfg(test)]
pub use webhook_command::MockWebhookCommand;
pub use webhook_command::{FixtureWebhookCommand, WebhookCommand, WebhookDelivery};
#[cfg(test)]
pub use webhook_event_store::MockWebhookEventStore;
pub use webhook_event_store::{
    FixtureWebhookEventStore, WebhookEventStore, WebhookEventStoreError,
};
