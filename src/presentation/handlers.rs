// HTTP request handlers
use crate::application::monitoring_repository::MeasurementQuery;
use crate::domain::auth::{AuthResponse, Credentials, Registration, SessionCookie};
use crate::domain::catalog::ResolvedSelection;
use crate::domain::filter::{FilterSelection, FilterUpdate};
use crate::domain::simulation::SimulationConfig;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::live_stream::ndjson_response;
use crate::presentation::app_state::AppState;
use crate::presentation::error::DashboardError;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

type HandlerResult = Result<Response<Body>, DashboardError>;

async fn respond<T: Serialize>(headers: &HeaderMap, data: &T) -> HandlerResult {
    Ok(json_response(data, accepts_brotli(headers)).await?)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn index() -> &'static str {
    "power-monitor dashboard"
}

pub async fn login_page() -> &'static str {
    "Sign in with POST /api/auth/sign-in"
}

pub async fn register_page() -> &'static str {
    "Create an account with POST /api/auth/sign-up"
}

// Auth

async fn start_session(state: &AppState, headers: &HeaderMap, auth: &AuthResponse) -> HandlerResult {
    state.open_session().await;

    let cookie = SessionCookie::new(auth.token.clone(), state.settings.dashboard.production);
    let mut response = respond(headers, auth).await?;
    let value = HeaderValue::from_str(&cookie.to_header_value())
        .map_err(|_| DashboardError::Encoding(StatusCode::INTERNAL_SERVER_ERROR))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

pub async fn sign_in(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> HandlerResult {
    let auth = state.auth.sign_in(&credentials).await?;
    start_session(&state, &headers, &auth).await
}

pub async fn sign_up(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(registration): Json<Registration>,
) -> HandlerResult {
    let auth = state.auth.sign_up(&registration).await?;
    start_session(&state, &headers, &auth).await
}

pub async fn check_status(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    let auth = state
        .auth
        .check_status()
        .await
        .ok_or(DashboardError::Unauthenticated)?;
    respond(&headers, &auth.user).await
}

pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.live_view.detach();
    state.live_view.feed().disconnect();
    state.auth.logout();
    info!("Signed out");
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, SessionCookie::expired())],
    )
}

// Catalog

pub async fn list_work_centers(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    state.catalog.load().await;
    respond(&headers, &state.catalog.snapshot().work_centers()).await
}

pub async fn list_areas(
    Path(work_center_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    state.catalog.load().await;
    respond(&headers, &state.catalog.areas_by_work_center(&work_center_id)).await
}

pub async fn list_sensors(
    Path(area_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    state.catalog.load().await;
    respond(&headers, &state.catalog.sensors_by_area(&area_id)).await
}

// Filters

#[derive(Serialize)]
struct FilterView {
    selection: FilterSelection,
    resolved: ResolvedSelection,
}

impl FilterView {
    fn new(state: &AppState, selection: FilterSelection) -> Self {
        let resolved = state.catalog.resolve(&selection);
        Self { selection, resolved }
    }
}

pub async fn get_filters(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    respond(&headers, &FilterView::new(&state, state.live_view.selection())).await
}

pub async fn put_filters(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(update): Json<FilterUpdate>,
) -> HandlerResult {
    state.catalog.load().await;
    let selection = state.live_view.apply_filter(update)?;
    respond(&headers, &FilterView::new(&state, selection)).await
}

pub async fn reset_filters(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    state.live_view.reset_filter();
    respond(&headers, &FilterView::new(&state, state.live_view.selection())).await
}

// Historical data

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn current_query(state: &AppState) -> MeasurementQuery {
    MeasurementQuery::from_selection(&state.live_view.selection())
}

pub async fn list_measurements(
    Query(paging): Query<PageQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    let query = current_query(&state).with_page(
        Some(paging.page.unwrap_or(DEFAULT_PAGE)),
        Some(paging.limit.unwrap_or(DEFAULT_LIMIT)),
    );
    let fetched = state.measurements.measurements(query).await;

    if !fetched.is_current(&current_query(&state).with_page(fetched.query.page, fetched.query.limit)) {
        debug!("Filter changed while measurements were loading");
    }
    respond(&headers, &fetched).await
}

pub async fn statistics(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    let fetched = state.measurements.statistics(current_query(&state)).await;
    if !fetched.is_current(&current_query(&state)) {
        debug!("Filter changed while statistics were loading");
    }
    respond(&headers, &fetched).await
}

// Live feed

#[derive(Deserialize)]
pub struct DebugToggle {
    pub enabled: bool,
}

pub async fn live_snapshot(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    respond(&headers, &state.live_view.snapshot()).await
}

pub async fn set_debug(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(toggle): Json<DebugToggle>,
) -> HandlerResult {
    state.live_view.set_debug_mode(toggle.enabled);
    respond(&headers, &state.live_view.snapshot()).await
}

pub async fn live_connect(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    state.live_view.attach().await;
    respond(&headers, &state.live_view.snapshot()).await
}

pub async fn live_disconnect(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    state.live_view.detach();
    state.live_view.feed().disconnect();
    respond(&headers, &state.live_view.snapshot()).await
}

/// Buffered measurements, then every accepted one as it arrives
pub async fn live_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (backlog, updates) = state.live_view.follow();
    match ndjson_response(backlog, updates) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

// Simulation

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSimulation {
    pub interval_seconds: Option<u64>,
    pub voltage_base: Option<f64>,
    pub current_base: Option<f64>,
}

pub async fn simulation_status(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    respond(&headers, &state.simulator.status()).await
}

pub async fn start_simulation(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartSimulation>>,
) -> HandlerResult {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let defaults = &state.settings.simulator;
    let resolved = state.catalog.resolve(&state.live_view.selection());

    let mut config = SimulationConfig::for_selection(
        &resolved,
        request.interval_seconds.unwrap_or(defaults.interval_seconds),
        defaults.api_key.clone(),
    )?;
    config.voltage_base = Some(request.voltage_base.unwrap_or(defaults.voltage_base));
    config.current_base = Some(request.current_base.unwrap_or(defaults.current_base));

    respond(&headers, &state.simulator.start(config)).await
}

pub async fn stop_simulation(headers: HeaderMap, State(state): State<Arc<AppState>>) -> HandlerResult {
    respond(&headers, &state.simulator.stop()).await
}
