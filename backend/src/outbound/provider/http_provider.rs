//! Reqwest-backed payment provider adapter.
//!
//! Owns transport details only: request serialisation, the per-request
//! timeout, status classification, and response decoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use super::dto::{ProviderPayoutRequestDto, ProviderPayoutResponseDto};
use crate::domain::CORRELATION_ID_HEADER;
use crate::domain::ports::{
    PaymentProvider, PaymentProviderError, ProviderAcceptance, ProviderPayoutRequest,
};

const USER_AGENT: &str = concat!("payouts/", env!("CARGO_PKG_VERSION"));

/// Provider adapter posting payouts to one endpoint.
#[derive(Debug, Clone)]
pub struct HttpPaymentProvider {
    client: Client,
    endpoint: Url,
}

impl HttpPaymentProvider {
    /// Build an adapter whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn submit(
        &self,
        request: &ProviderPayoutRequest,
    ) -> Result<ProviderAcceptance, PaymentProviderError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&ProviderPayoutRequestDto::from(request));
        if let Some(correlation_id) = request.correlation_id {
            builder = builder.header(CORRELATION_ID_HEADER, correlation_id.to_string());
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(
            payout_id = %request.payout_id,
            status = status.as_u16(),
            "payment provider responded"
        );
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        parse_acceptance(body.as_ref())
    }
}

fn parse_acceptance(body: &[u8]) -> Result<ProviderAcceptance, PaymentProviderError> {
    let decoded: ProviderPayoutResponseDto = serde_json::from_slice(body).map_err(|error| {
        PaymentProviderError::decode(format!("invalid provider JSON payload: {error}"))
    })?;
    match decoded.reference {
        Some(reference) if !reference.trim().is_empty() => Ok(ProviderAcceptance {
            reference: reference.trim().to_owned(),
        }),
        _ => Err(PaymentProviderError::decode("response carried no reference")),
    }
}

fn map_transport_error(error: reqwest::Error) -> PaymentProviderError {
    if error.is_timeout() {
        PaymentProviderError::timeout(error.to_string())
    } else {
        PaymentProviderError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentProviderError {
    let message = body_preview(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => PaymentProviderError::rate_limited(message),
        StatusCode::INTERNAL_SERVER_ERROR => {
            PaymentProviderError::server_error(status.as_u16(), message)
        }
        _ => PaymentProviderError::rejected(status.as_u16(), message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
        format!("{preview}...")
    } else {
        compact
    }
}
