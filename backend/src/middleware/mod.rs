//! Request middleware.
//!
//! Purpose: request lifecycle concerns that sit outside handlers, currently
//! correlation identifiers and request completion logging.

pub mod trace;

pub use trace::CorrelationMiddleware;
