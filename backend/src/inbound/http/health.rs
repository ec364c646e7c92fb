//! Health endpoints: liveness and readiness checks for orchestrators and
//! load balancers.

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, get, http::header, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shared readiness state.
pub struct HealthState {
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }
}

impl HealthState {
    /// Create a state that reports not ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the service as ready once the listener is bound.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Return readiness state.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Liveness body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct HealthBody {
    /// `ok` when serving, `starting` before the listener is bound.
    #[schema(example = "ok")]
    pub status: String,
}

fn health_response(ok: bool) -> HttpResponse {
    let mut response = if ok {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response.insert_header((header::CACHE_CONTROL, "no-store"));
    response.json(HealthBody {
        status: if ok { "ok" } else { "starting" }.to_owned(),
    })
}

/// Liveness check; 200 while the process serves requests.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    security([]),
    responses((status = 200, description = "Process is alive", body = HealthBody))
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    health_response(true)
}

/// Readiness check; 503 until the server is bound.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    security([]),
    responses(
        (status = 200, description = "Ready for traffic", body = HealthBody),
        (status = 503, description = "Still starting", body = HealthBody)
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    health_response(state.is_ready())
}
