//! Wire shapes for the provider's payout endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::ports::ProviderPayoutRequest;

/// Body of `POST <provider_url>`; the amount travels as a decimal string.
#[derive(Debug, Serialize)]
pub(super) struct ProviderPayoutRequestDto<'a> {
    pub(super) amount: String,
    pub(super) currency: &'static str,
    pub(super) reference: &'a str,
}

impl<'a> From<&'a ProviderPayoutRequest> for ProviderPayoutRequestDto<'a> {
    fn from(request: &'a ProviderPayoutRequest) -> Self {
        Self {
            amount: request.amount.to_string(),
            currency: request.currency.code(),
            reference: &request.reference,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProviderPayoutResponseDto {
    #[serde(default)]
    pub(super) reference: Option<String>,
}
