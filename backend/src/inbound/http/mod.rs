//! HTTP inbound adapter exposing REST endpoints.

use actix_web::web;

pub mod auth;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod payouts;
pub mod schemas;
pub mod session;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod webhooks;

pub use error::ApiResult;

/// Register the payout and webhook routes plus extractor configuration.
///
/// Development session routes are mounted only when `dev_login` is set. The
/// caller supplies [`state::HttpState`], the session middleware, and health
/// routes.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use payouts::inbound::http::{configure_api, state::HttpState};
///
/// let app = App::new()
///     .app_data(web::Data::new(HttpState::default()))
///     .configure(|cfg| configure_api(cfg, false));
/// ```
pub fn configure_api(cfg: &mut web::ServiceConfig, dev_login: bool) {
    cfg.app_data(error::json_config())
        .app_data(error::query_config())
        .service(payouts::create_payout)
        .service(payouts::list_payouts)
        .service(webhooks::receive_payment_webhook);
    if dev_login {
        cfg.service(auth::dev_login)
            .service(auth::me)
            .service(auth::logout);
    }
}
