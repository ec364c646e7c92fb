//! Development session endpoints.
//!
//! Production deployments sit behind an external identity provider that
//! writes the session cookie. These handlers mint sessions locally and refuse
//! to do so unless `dev_login` is enabled.
//!
//! ```text
//! POST /auth/dev-login {"userId":"3fa85f64-5717-4562-b3fc-2c963f66afa6"}
//! GET  /auth/me
//! POST /auth/logout
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{Error, UserId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Optional identity to adopt; a random user is created when omitted.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevLoginBody {
    /// UUID of the user to act as.
    #[schema(format = "uuid")]
    pub user_id: Option<String>,
}

/// Identity bound to the current session.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserBody {
    /// UUID stored in the session.
    #[schema(format = "uuid")]
    pub user_id: String,
}

/// Start a development session.
#[utoipa::path(
    post,
    path = "/auth/dev-login",
    request_body(content = DevLoginBody, description = "Optional user id"),
    responses(
        (status = 200, description = "Session issued", body = SessionUserBody,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 404, description = "Development login disabled", body = ErrorSchema),
        (status = 422, description = "Invalid user id", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "devLogin",
    security([])
)]
#[post("/auth/dev-login")]
pub async fn dev_login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: Option<web::Json<DevLoginBody>>,
) -> ApiResult<web::Json<SessionUserBody>> {
    if !state.dev_login {
        return Err(Error::not_found("development login is disabled"));
    }
    let requested = payload.and_then(|body| body.into_inner().user_id);
    let user_id = requested.map_or_else(
        || Ok(UserId::random()),
        |raw| {
            UserId::new(&raw).map_err(|err| {
                Error::validation_failed(err.to_string())
                    .with_details(json!({ "field": "userId", "value": raw }))
            })
        },
    )?;
    session.persist_user(&user_id)?;
    info!(user_id = %user_id, "issued development session");
    Ok(web::Json(SessionUserBody {
        user_id: user_id.to_string(),
    }))
}

/// Report the session's user.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = SessionUserBody),
        (status = 401, description = "Login required", body = ErrorSchema)
    ),
    tags = ["auth"],
    operation_id = "currentUser",
    security(("SessionCookie" = []))
)]
#[get("/auth/me")]
pub async fn me(session: SessionContext) -> ApiResult<web::Json<SessionUserBody>> {
    let user_id = session.require_user_id()?;
    Ok(web::Json(SessionUserBody {
        user_id: user_id.to_string(),
    }))
}

/// End the session.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Session cleared")),
    tags = ["auth"],
    operation_id = "logout",
    security([])
)]
#[post("/auth/logout")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.clear();
    HttpResponse::NoContent().finish()
}
