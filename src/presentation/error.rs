// Dashboard error responses
use crate::application::auth_service::AuthError;
use crate::domain::filter::FilterError;
use crate::domain::simulation::SimulationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Failed to encode response")]
    Encoding(StatusCode),
}

impl DashboardError {
    fn status(&self) -> StatusCode {
        match self {
            DashboardError::Auth(AuthError::Rejected(_)) | DashboardError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            DashboardError::Auth(AuthError::Transport(_)) => StatusCode::BAD_GATEWAY,
            DashboardError::Filter(_) => StatusCode::BAD_REQUEST,
            DashboardError::Simulation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Encoding(status) => *status,
        }
    }
}

impl From<StatusCode> for DashboardError {
    fn from(status: StatusCode) -> Self {
        DashboardError::Encoding(status)
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
