//! HTTP adapter mapping for domain errors.
//!
//! Keeps [`Error`] transport agnostic while giving every handler the same
//! JSON error body, status mapping, and correlation header.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, ResponseError, http::StatusCode, web};
use serde_json::{error::Category, json};
use tracing::{debug, error};

use crate::domain::{CORRELATION_ID_HEADER, Error, ErrorCode};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

/// Message returned in place of any internal error detail.
pub const REDACTED_MESSAGE: &str = "Internal server error";

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if error.code() != ErrorCode::InternalError {
        return error.clone();
    }
    error!(message = error.message(), trace_id = ?error.trace_id(), "internal error");
    let redacted = Error::internal(REDACTED_MESSAGE);
    let Some(id) = error.trace_id() else {
        return redacted;
    };
    redacted.with_trace_id(id.to_owned())
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((CORRELATION_ID_HEADER, id.to_owned()));
        }

        builder.json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        error!(error = %err, "actix error promoted to domain error");
        Self::internal(REDACTED_MESSAGE)
    }
}

fn json_payload_error(err: &JsonPayloadError) -> Error {
    match err {
        JsonPayloadError::Deserialize(inner) if inner.classify() == Category::Data => {
            Error::validation_failed(inner.to_string())
                .with_details(json!({ "code": "invalid_body" }))
        }
        JsonPayloadError::Deserialize(inner) => {
            Error::invalid_request(format!("malformed JSON body: {inner}"))
        }
        JsonPayloadError::ContentType => {
            Error::invalid_request("expected an application/json body")
        }
        other => Error::invalid_request(other.to_string()),
    }
}

/// JSON extractor configuration mapping body failures onto the error schema.
///
/// Syntax errors are `400 invalid_request`; well-formed bodies with missing or
/// mistyped fields are `422 validation_failed`.
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req: &HttpRequest| {
        debug!(path = req.path(), error = %err, "rejected JSON body");
        json_payload_error(&err).into()
    })
}

/// Query extractor configuration mapping parse failures to `422`.
#[must_use]
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, req: &HttpRequest| {
        debug!(path = req.path(), error = %err, "rejected query string");
        Error::validation_failed(err.to_string())
            .with_details(json!({ "code": "invalid_query" }))
            .into()
    })
}
