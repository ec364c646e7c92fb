//! Shared error mapping for the Diesel adapters.
//!
//! Each port has its own error enum, so the helpers take the port's
//! constructors and keep the classification in one place.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map a pool failure through the port's `connection` constructor.
pub(crate) fn map_pool_error<E>(error: PoolError, connection: impl FnOnce(String) -> E) -> E {
    connection(error.into_message())
}

/// Map a Diesel failure into `query` or `connection` errors.
///
/// Driver messages go to the debug log only; the returned message is stable.
pub(crate) fn map_diesel_error<E>(
    error: DieselError,
    query: impl FnOnce(&'static str) -> E,
    connection: impl FnOnce(&'static str) -> E,
) -> E {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(%error, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::QueryBuilderError(_) => query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _)
        | DieselError::BrokenTransactionManager => connection("database connection error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            query("unique constraint violated")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            query("serialization failure")
        }
        _ => query("database error"),
    }
}

/// Whether `error` is a unique index violation.
pub(crate) const fn is_unique_violation(error: &DieselError) -> bool {
    matches!(
        error,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Convert a row count from Diesel into the port's `u64`.
pub(crate) fn affected_rows(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}
