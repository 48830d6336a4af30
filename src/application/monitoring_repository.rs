// Repository traits for backend access
use crate::application::auth_service::AuthError;
use crate::domain::auth::{AuthResponse, Credentials, Registration};
use crate::domain::catalog::WorkCenter;
use crate::domain::filter::FilterSelection;
use crate::domain::measurement::{MeasurementRecord, Page, Statistics};
use crate::domain::simulation::SimulatedMeasurement;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

/// Parameters shared by `GET /measurements` and `GET /statistics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementQuery {
    pub work_center_id: Option<String>,
    pub area_id: Option<String>,
    pub sensor_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl MeasurementQuery {
    pub fn from_selection(selection: &FilterSelection) -> Self {
        let range = selection.date_range();
        Self {
            work_center_id: selection.work_center().map(str::to_string),
            area_id: selection.area().map(str::to_string),
            sensor_id: selection.sensor().map(str::to_string),
            start_date: range.map(|r| r.from),
            end_date: range.map(|r| r.to),
            page: None,
            limit: None,
        }
    }

    pub fn with_page(mut self, page: Option<u32>, limit: Option<u32>) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Query-string pairs in backend order; unset fields are omitted
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(v) = &self.work_center_id {
            params.push(("workCenterId", v.clone()));
        }
        if let Some(v) = &self.area_id {
            params.push(("areaId", v.clone()));
        }
        if let Some(v) = &self.sensor_id {
            params.push(("sensorId", v.clone()));
        }
        if let Some(v) = self.start_date {
            params.push(("startDate", v.format("%Y-%m-%d").to_string()));
        }
        if let Some(v) = self.end_date {
            params.push(("endDate", v.format("%Y-%m-%d").to_string()));
        }
        if let Some(v) = self.page {
            params.push(("page", v.to_string()));
        }
        if let Some(v) = self.limit {
            params.push(("limit", v.to_string()));
        }
        params
    }
}

#[async_trait]
pub trait MonitoringRepository: Send + Sync {
    /// Full work center -> area -> sensor hierarchy
    async fn list_work_centers(&self) -> anyhow::Result<Vec<WorkCenter>>;

    async fn get_measurements(&self, query: &MeasurementQuery) -> anyhow::Result<Page<MeasurementRecord>>;

    async fn get_statistics(&self, query: &MeasurementQuery) -> anyhow::Result<Statistics>;

    /// Ingest a measurement, authenticated with an API key instead of the session
    async fn post_measurement(&self, payload: &SimulatedMeasurement, api_key: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError>;

    async fn sign_up(&self, registration: &Registration) -> Result<AuthResponse, AuthError>;

    /// Validate the stored session token
    async fn check_status(&self) -> anyhow::Result<AuthResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::sample_catalog;
    use crate::domain::filter::DateRange;

    #[test]
    fn test_params_from_selection() {
        let catalog = sample_catalog();
        let mut selection = FilterSelection::default();
        selection.set_work_center(Some("wc1".to_string()), &catalog).unwrap();
        selection.set_date_range(Some(
            DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap(),
        ));

        let params = MeasurementQuery::from_selection(&selection)
            .with_page(Some(2), Some(10))
            .to_params();

        assert_eq!(
            params,
            vec![
                ("workCenterId", "wc1".to_string()),
                ("startDate", "2024-01-01".to_string()),
                ("endDate", "2024-01-31".to_string()),
                ("page", "2".to_string()),
                ("limit", "10".to_string()),
            ]
        );
    }
}
