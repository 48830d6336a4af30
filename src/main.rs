// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::application::auth_service::{AuthService, SessionStore};
use crate::application::catalog_service::CatalogService;
use crate::application::live_feed::LiveFeed;
use crate::application::live_view::LiveView;
use crate::application::measurement_service::MeasurementService;
use crate::application::simulator::Simulator;
use crate::infrastructure::api_client::ApiClient;
use crate::infrastructure::config::load_settings;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,power_monitor=debug")),
        )
        .init();

    let settings = load_settings()?;

    // Backend client (infrastructure layer), sharing one session token
    let session = SessionStore::default();
    let client = Arc::new(ApiClient::new(settings.api.base_url.clone(), session.clone()));

    // Services (application layer)
    let catalog = Arc::new(CatalogService::new(client.clone()));
    let feed = Arc::new(LiveFeed::new(settings.api.ws_url.clone(), session.clone()));
    let live_view = Arc::new(LiveView::new(
        feed.clone(),
        catalog.clone(),
        settings.live.buffer_capacity,
    ));
    let simulator = Simulator::new(client.clone());

    let state = Arc::new(AppState {
        catalog,
        measurements: MeasurementService::new(client.clone()),
        live_view: live_view.clone(),
        simulator: simulator.clone(),
        auth: AuthService::new(client, session),
        settings: settings.clone(),
    });

    // Warm the catalog and the live feed; a session cookie seen later reopens both
    tokio::spawn({
        let state = state.clone();
        async move { state.open_session().await }
    });

    let addr: SocketAddr = settings
        .dashboard
        .bind
        .parse()
        .with_context(|| format!("Invalid dashboard bind address {}", settings.dashboard.bind))?;
    info!(%addr, api = %settings.api.base_url, "Starting power-monitor dashboard");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    live_view.detach();
    feed.disconnect();
    simulator.stop();

    Ok(())
}
