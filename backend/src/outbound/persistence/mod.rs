//! PostgreSQL persistence adapters using Diesel.
//!
//! Adapters only translate between rows and domain types; transition rules
//! live in the domain. Uniqueness constraints and row locks provide the
//! atomicity the ports promise.
//!
//! ```ignore
//! use payouts::outbound::persistence::{DbPool, DieselPayoutLedger, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/payouts")).await?;
//! let ledger = DieselPayoutLedger::new(pool);
//! ```

mod diesel_helpers;
mod diesel_idempotency_key_store;
mod diesel_payout_ledger;
mod diesel_webhook_event_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_idempotency_key_store::DieselIdempotencyKeyStore;
pub use diesel_payout_ledger::DieselPayoutLedger;
pub use diesel_webhook_event_store::DieselWebhookEventStore;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
