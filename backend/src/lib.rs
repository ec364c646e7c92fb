//! Idempotent payout service.
//!
//! Hexagonal layout: [`domain`] holds types, ports, and services; [`inbound`]
//! adapts HTTP requests onto driving ports; [`outbound`] implements driven
//! ports over PostgreSQL, memory, and the payment provider's HTTP API.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::CorrelationMiddleware;
