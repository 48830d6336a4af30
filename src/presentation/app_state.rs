// Application state for HTTP handlers
use crate::application::auth_service::AuthService;
use crate::application::catalog_service::CatalogService;
use crate::application::live_view::LiveView;
use crate::application::measurement_service::MeasurementService;
use crate::application::simulator::Simulator;
use crate::infrastructure::config::Settings;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub measurements: MeasurementService,
    pub live_view: Arc<LiveView>,
    pub simulator: Simulator,
    pub auth: AuthService,
    pub settings: Settings,
}

impl AppState {
    /// Load the catalog and open the live feed with the current token. Any
    /// channel opened under a previous token is replaced.
    pub async fn open_session(&self) {
        self.catalog.reload().await;
        self.live_view.detach();
        self.live_view.feed().disconnect();
        self.live_view.attach().await;
    }
}
