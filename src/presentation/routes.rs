// Router and route protection
use crate::domain::auth::{LOGIN_PATH, RouteAccess, route_access, token_from_cookie_header};
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::*;
use axum::{
    Router,
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Paths reachable without a session cookie
fn is_public(path: &str) -> bool {
    path == "/healthz" || path.starts_with("/api/auth/")
}

fn session_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_string)
}

/// The cookie carries the backend token; a token this process has not seen
/// yet (restart, another browser) becomes the backend session.
async fn require_session(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let token = session_token(&request);
    if let Some(token) = &token {
        if state.auth.adopt_token(token) {
            state.open_session().await;
        }
    }

    let path = request.uri().path().to_string();
    if is_public(&path) {
        return next.run(request).await;
    }

    match route_access(&path, token.is_some()) {
        RouteAccess::Allow => next.run(request).await,
        RouteAccess::RedirectHome => Redirect::temporary("/").into_response(),
        RouteAccess::RedirectLogin { callback_url } => Redirect::temporary(&format!(
            "{}?callbackUrl={}",
            LOGIN_PATH,
            urlencoding::encode(&callback_url)
        ))
        .into_response(),
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // JSON bodies are compressed by the handlers, so no CompressionLayer here
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health_check))
        .route("/auth/login", get(login_page))
        .route("/auth/register", get(register_page))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/check-status", get(check_status))
        .route("/api/auth/logout", post(logout))
        .route("/api/work-centers", get(list_work_centers))
        .route("/api/work-centers/:id/areas", get(list_areas))
        .route("/api/areas/:id/sensors", get(list_sensors))
        .route("/api/filters", get(get_filters).put(put_filters).delete(reset_filters))
        .route("/api/measurements", get(list_measurements))
        .route("/api/statistics", get(statistics))
        .route("/api/live", get(live_snapshot))
        .route("/api/live/debug", put(set_debug))
        .route("/api/live/connect", post(live_connect))
        .route("/api/live/disconnect", post(live_disconnect))
        .route("/api/live/stream", get(live_stream))
        .route("/api/simulation", get(simulation_status))
        .route("/api/simulation/start", post(start_simulation))
        .route("/api/simulation/stop", post(stop_simulation))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::auth_service::tests::FakeGateway;
    use crate::application::auth_service::{AuthService, SessionStore};
    use crate::application::catalog_service::CatalogService;
    use crate::application::catalog_service::tests::FakeRepository;
    use crate::application::live_feed::tests::spawn_server;
    use crate::application::live_feed::{ConnectionState, LiveFeed};
    use crate::application::live_view::LiveView;
    use crate::application::measurement_service::MeasurementService;
    use crate::application::monitoring_repository::{AuthGateway, MonitoringRepository};
    use crate::application::simulator::Simulator;
    use crate::infrastructure::api_client::ApiClient;
    use crate::presentation::app_state::tests::settings;
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, Request, StatusCode};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(
        repository: Arc<dyn MonitoringRepository>,
        gateway: Arc<dyn AuthGateway>,
        session: SessionStore,
        ws_url: &str,
    ) -> Arc<AppState> {
        let settings = settings(ws_url);
        let catalog = Arc::new(CatalogService::new(repository.clone()));
        let feed = Arc::new(LiveFeed::new(settings.api.ws_url.clone(), session.clone()));
        Arc::new(AppState {
            catalog: catalog.clone(),
            measurements: MeasurementService::new(repository.clone()),
            live_view: Arc::new(LiveView::new(feed, catalog, settings.live.buffer_capacity)),
            simulator: Simulator::new(repository),
            auth: AuthService::new(gateway, session),
            settings,
        })
    }

    fn app() -> (Router, Arc<FakeRepository>) {
        let repository = Arc::new(FakeRepository::with_sample_catalog());
        let state = state_with(
            repository.clone(),
            Arc::new(FakeGateway::default()),
            SessionStore::default(),
            "ws://127.0.0.1:9",
        );
        (router(state), repository)
    }

    fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, "token=jwt-token");
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_missing_session_redirects_to_login() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/api/work-centers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?callbackUrl=%2Fapi%2Fwork-centers"
        );
    }

    #[tokio::test]
    async fn test_auth_page_with_session_redirects_home() {
        let (app, _) = app();
        let response = app.oneshot(authed("GET", "/auth/login", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let (app, _) = app();

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/work-centers", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);

        let response = app
            .oneshot(authed("GET", "/api/work-centers/wc1/areas", None))
            .await
            .unwrap();
        let areas = json_body(response).await;
        let names: Vec<&str> = areas
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Assembly", "Painting"]);
    }

    #[tokio::test]
    async fn test_foreign_area_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(authed(
                "PUT",
                "/api/filters",
                Some(json!({"workCenterId": "wc1", "areaId": "a3"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_then_measurements_use_selection() {
        let (app, repository) = app();
        let response = app
            .clone()
            .oneshot(authed(
                "PUT",
                "/api/filters",
                Some(json!({"workCenterId": "wc1", "areaId": "a1", "sensorId": "s2"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let filters = json_body(response).await;
        assert_eq!(filters["resolved"]["sensorCode"], "S-002");

        let response = app
            .oneshot(authed("GET", "/api/measurements?page=3", None))
            .await
            .unwrap();
        let fetched = json_body(response).await;
        assert_eq!(fetched["result"]["meta"]["total"], 42);
        assert_eq!(fetched["result"]["meta"]["page"], 3);

        let queries = repository.queries.lock();
        assert_eq!(queries[0].sensor_id.as_deref(), Some("s2"));
        assert_eq!(queries[0].limit, Some(10));
    }

    #[tokio::test]
    async fn test_simulation_needs_full_selection() {
        let (app, repository) = app();
        let response = app
            .clone()
            .oneshot(authed("POST", "/api/simulation/start", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        app.clone()
            .oneshot(authed(
                "PUT",
                "/api/filters",
                Some(json!({"workCenterId": "wc2", "areaId": "a3", "sensorId": "s4"})),
            ))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(authed("POST", "/api/simulation/start", Some(json!({"intervalSeconds": 60}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["isRunning"], true);

        let response = app
            .oneshot(authed("POST", "/api/simulation/stop", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["isRunning"], false);

        tokio::task::yield_now().await;
        let posted = repository.posted.lock();
        assert!(posted.iter().all(|p| p.work_center == "Plant B" && p.sensor_id.as_deref() == Some("S-004")));
    }

    #[tokio::test]
    async fn test_sign_in_sets_cookie() {
        let (app, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/sign-in")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"email": "a@b.c", "password": "secret"}).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("token=jwt-token;"));
        assert_eq!(json_body(response).await["user"]["fullName"], "Ana Lopez");
    }

    #[tokio::test]
    async fn test_rejected_sign_in_returns_message() {
        let (app, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/sign-in")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"email": "a@b.c", "password": "wrong"}).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Credentials are not valid");
    }

    #[tokio::test]
    async fn test_brotli_when_accepted() {
        let (app, _) = app();
        let mut request = authed("GET", "/api/statistics", None);
        request
            .headers_mut()
            .insert(header::ACCEPT_ENCODING, "br".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    }

    #[tokio::test]
    async fn test_cookie_token_reaches_backend_and_opens_feed() {
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let recorder = seen.clone();
        let backend = Router::new().route(
            "/api/work-centers",
            get(move |headers: HeaderMap| async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                recorder.lock().push(auth);
                axum::Json(json!([{"id": "wc1", "name": "Plant A", "areas": []}]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, backend).await.unwrap();
        });
        let (ws_url, mut sockets) = spawn_server().await;

        // fresh process: nothing signed in here, the browser still holds a cookie
        let session = SessionStore::default();
        let client = Arc::new(ApiClient::new(base_url, session.clone()));
        let state = state_with(client.clone(), client, session, &ws_url);
        let app = router(state.clone());

        let mut request = authed("GET", "/api/work-centers", None);
        request
            .headers_mut()
            .insert(header::COOKIE, "token=valid-jwt".parse().unwrap());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
        let seen = seen.lock().clone();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|auth| auth.as_deref() == Some("Bearer valid-jwt")));

        let socket = tokio::time::timeout(Duration::from_secs(2), sockets.recv()).await;
        assert!(matches!(socket, Ok(Some(_))));
        assert_eq!(state.live_view.snapshot().connection, ConnectionState::Connected);
    }
}
