//! Payout HTTP handlers.
//!
//! ```text
//! POST /payouts      Idempotency-Key: k1  {"amount":"10.00","currency":"USD"}
//! GET  /payouts?page=1&limit=20
//! ```

use std::str::FromStr;

use actix_web::{HttpRequest, HttpResponse, get, post, web};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{CreatePayoutRequest, ListPayoutsRequest};
use crate::domain::{Error, PageRequest, PageRequestError, Payout, PayoutPage};
use crate::inbound::http::ApiResult;
use crate::inbound::http::idempotency::require_idempotency_key;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Response header set when the payout was created by an earlier request.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// Amount as sent by clients: a decimal string or a JSON number.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AmountInput {
    /// Decimal string such as `"10.00"`.
    Text(String),
    /// Bare JSON number, kept unparsed until validation.
    Number(serde_json::Number),
}

impl AmountInput {
    fn parse(&self) -> Result<Decimal, Error> {
        let raw = match self {
            Self::Text(text) => text.trim().to_owned(),
            Self::Number(number) => number.to_string(),
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .map_err(|_| {
                Error::validation_failed("amount must be a decimal number")
                    .with_details(json!({ "field": "amount", "value": raw }))
            })
    }
}

/// Request payload for creating a payout.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreatePayoutBody {
    /// Decimal string or number greater than zero.
    #[schema(value_type = String, example = "10.00")]
    pub amount: AmountInput,
    /// ISO 4217 code; matched case-insensitively.
    #[schema(example = "USD")]
    pub currency: String,
}

/// Public view of a payout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PayoutBody {
    /// Ledger identifier, stable across replays of the same key.
    #[schema(example = 42)]
    pub id: i64,
    /// Two-decimal amount string.
    #[schema(example = "10.00")]
    pub amount: String,
    /// ISO 4217 code.
    #[schema(example = "USD")]
    pub currency: String,
    /// `processing`, `paid`, or `failed`.
    #[schema(example = "processing")]
    pub status: String,
}

impl From<&Payout> for PayoutBody {
    fn from(payout: &Payout) -> Self {
        Self {
            id: payout.id.get(),
            amount: payout.amount.to_string(),
            currency: payout.currency.code().to_owned(),
            status: payout.status.as_str().to_owned(),
        }
    }
}

/// One page of the caller's payouts, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayoutListBody {
    /// Page served, 1-indexed.
    pub page: u32,
    /// Page size applied.
    pub limit: u32,
    /// Matching payouts across all pages.
    pub total: u64,
    /// Payouts on this page.
    pub items: Vec<PayoutBody>,
}

impl From<PayoutPage> for PayoutListBody {
    fn from(page: PayoutPage) -> Self {
        Self {
            page: page.request.page(),
            limit: page.request.limit(),
            total: page.total,
            items: page.items.iter().map(PayoutBody::from).collect(),
        }
    }
}

/// Paging parameters for `GET /payouts`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPayoutsParams {
    /// 1-indexed page, default 1.
    pub page: Option<u32>,
    /// Page size between 1 and 100, default 20.
    pub limit: Option<u32>,
}

impl ListPayoutsParams {
    fn page_request(self) -> Result<PageRequest, Error> {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(PageRequest::DEFAULT_LIMIT),
        )
        .map_err(|err| {
            let field = match err {
                PageRequestError::PageOutOfRange => "page",
                PageRequestError::LimitOutOfRange { .. } => "limit",
            };
            Error::validation_failed(err.to_string()).with_details(json!({ "field": field }))
        })
    }
}

/// Create a payout, or return the payout already bound to the idempotency key.
///
/// Repeating a request with the same key returns the same payout id. While
/// another request still holds the key the response is `409`; retry with the
/// same key.
#[utoipa::path(
    post,
    path = "/payouts",
    request_body = CreatePayoutBody,
    params(
        ("Idempotency-Key" = String, Header, description = "Client token scoping this logical request")
    ),
    responses(
        (status = 200, description = "Payout snapshot", body = PayoutBody),
        (status = 400, description = "Missing or invalid idempotency key", body = ErrorSchema),
        (status = 401, description = "Login required", body = ErrorSchema),
        (status = 409, description = "Key currently processing", body = ErrorSchema),
        (status = 422, description = "Invalid amount or currency", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["payouts"],
    operation_id = "createPayout",
    security(("SessionCookie" = []))
)]
#[post("/payouts")]
pub async fn create_payout(
    state: web::Data<HttpState>,
    session: SessionContext,
    req: HttpRequest,
    payload: web::Json<CreatePayoutBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let idempotency_key = require_idempotency_key(req.headers())?;
    let body = payload.into_inner();
    let amount = body.amount.parse()?;

    let response = state
        .payouts
        .create_payout(CreatePayoutRequest {
            user_id,
            idempotency_key,
            amount,
            currency: body.currency,
        })
        .await?;

    let mut builder = HttpResponse::Ok();
    if response.replayed {
        builder.insert_header((IDEMPOTENT_REPLAYED_HEADER, "true"));
    }
    Ok(builder.json(PayoutBody::from(&response.payout)))
}

/// List the caller's payouts, most recent first.
#[utoipa::path(
    get,
    path = "/payouts",
    params(ListPayoutsParams),
    responses(
        (status = 200, description = "Payout page", body = PayoutListBody),
        (status = 401, description = "Login required", body = ErrorSchema),
        (status = 422, description = "Invalid page window", body = ErrorSchema),
        (status = 503, description = "Storage unavailable", body = ErrorSchema)
    ),
    tags = ["payouts"],
    operation_id = "listPayouts",
    security(("SessionCookie" = []))
)]
#[get("/payouts")]
pub async fn list_payouts(
    state: web::Data<HttpState>,
    session: SessionContext,
    params: web::Query<ListPayoutsParams>,
) -> ApiResult<web::Json<PayoutListBody>> {
    let user_id = session.require_user_id()?;
    let page = params.into_inner().page_request()?;

    let listing = state
        .payouts_query
        .list_payouts(ListPayoutsRequest { user_id, page })
        .await?;

    Ok(web::Json(PayoutListBody::from(listing)))
}

#[cfg(test)]
#[path = "payouts_tests.rs"]
mod tests;
