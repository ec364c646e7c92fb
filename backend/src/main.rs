//! Payout service entry point: loads configuration, wires adapters and
//! services, starts the idempotency reaper, and serves HTTP until shutdown.

mod server;

use actix_web::cookie::SameSite;
use actix_web::web;
use color_eyre::eyre::{Result, WrapErr, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use payouts::domain::IdempotencyReaper;
use payouts::inbound::http::health::HealthState;
use payouts::settings::PayoutSettings;

use server::{ServerConfig, build_http_state, build_storage, create_server, load_session_key};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        PayoutSettings::load().map_err(|err| eyre!("failed to load configuration: {err}"))?;

    let storage = build_storage(&settings).await?;
    let http_state = build_http_state(&settings, &storage)?;
    let reaper = IdempotencyReaper::new(storage.keys.clone(), settings.reaper_config()?).spawn();

    let key = load_session_key(settings.session_key_file.as_deref())?;
    let bind_addr = settings.bind_addr()?;
    let config = ServerConfig::new(key, settings.session_cookie_secure, SameSite::Lax, bind_addr)
        .with_dev_login(settings.dev_login);

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, http_state, config)?;
    info!(%bind_addr, "listening");

    let served = server.await;
    reaper.shutdown().await;
    served.wrap_err("http server failed")
}
