//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL key store, ledger, and webhook event store
//!   using Diesel.
//! - **memory**: the same three ports in process, for single-instance
//!   deployments and tests.
//! - **provider**: reqwest client for the payment provider.
//!
//! Adapters translate between domain types and infrastructure
//! representations. Transition rules stay in the domain.

pub mod memory;
pub mod persistence;
pub mod provider;
