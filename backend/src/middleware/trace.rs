//! Correlation middleware attaching a request-scoped [`CorrelationId`].
//!
//! A valid UUID in the inbound `x-correlation-id` header is adopted; anything
//! else is replaced by a fresh identifier. The id is scoped task-locally for
//! the handler, captured by every domain error, forwarded to the payment
//! provider, and echoed on the response.

use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{error, info};

use crate::domain::{CORRELATION_ID_HEADER, CorrelationId};

/// Middleware factory; wrap the outermost scope with it.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use payouts::CorrelationMiddleware;
///
/// let app = App::new().wrap(CorrelationMiddleware);
/// ```
#[derive(Clone)]
pub struct CorrelationMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CorrelationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = CorrelationService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationService { service }))
    }
}

/// Service wrapper produced by [`CorrelationMiddleware`].
pub struct CorrelationService<S> {
    service: S,
}

fn inbound_correlation_id(req: &ServiceRequest) -> Option<CorrelationId> {
    req.headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse().ok())
}

impl<S, B> Service<ServiceRequest> for CorrelationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let correlation_id = inbound_correlation_id(&req).unwrap_or_else(CorrelationId::generate);
        let method = req.method().clone();
        let path = req.path().to_owned();
        let started = Instant::now();
        let fut = self.service.call(req);

        Box::pin(CorrelationId::scope(correlation_id, async move {
            let mut res = fut.await?;
            match HeaderValue::from_str(&correlation_id.to_string()) {
                Ok(value) => {
                    res.response_mut()
                        .headers_mut()
                        .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
                }
                Err(error) => {
                    error!(%error, %correlation_id, "failed to encode correlation header");
                }
            }
            info!(
                %correlation_id,
                %method,
                path,
                status = res.status().as_u16(),
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "request completed"
            );
            Ok(res)
        }))
    }
}
