//! Payment provider outbound adapters.
//!
//! One attempt per call; retry policy lives in the domain gateway.

mod dto;
mod http_provider;

pub use http_provider::HttpPaymentProvider;
