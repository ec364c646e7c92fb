//! `Idempotency-Key` header parsing for payout creation.

use actix_web::http::header::HeaderMap;
use serde_json::json;

use crate::domain::{Error, IdempotencyKey, IdempotencyKeyValidationError};

/// HTTP header name for idempotency keys.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Extract the required idempotency key, mapping every failure to 400.
///
/// # Errors
///
/// Returns [`crate::domain::ErrorCode::InvalidRequest`] when the header is
/// missing, not visible ASCII, empty, or too long.
pub fn require_idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey, Error> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Err(Error::invalid_request("Idempotency-Key header required")
            .with_details(json!({ "header": IDEMPOTENCY_KEY_HEADER })));
    };
    let raw = value
        .to_str()
        .map_err(|_| map_idempotency_key_error(IdempotencyKeyValidationError::InvalidCharacters))?;
    IdempotencyKey::new(raw).map_err(map_idempotency_key_error)
}

fn map_idempotency_key_error(err: IdempotencyKeyValidationError) -> Error {
    Error::invalid_request(err.to_string()).with_details(json!({
        "header": IDEMPOTENCY_KEY_HEADER,
    }))
}
