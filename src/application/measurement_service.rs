// Measurement service - Historical records and statistics
use crate::application::monitoring_repository::{MeasurementQuery, MonitoringRepository};
use crate::domain::measurement::{MeasurementRecord, Page, Statistics};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Result tagged with the query it answers, so a caller can drop responses
/// that arrive after the filter has moved on.
#[derive(Debug, Clone, Serialize)]
pub struct Fetched<T> {
    pub query: MeasurementQuery,
    pub result: T,
}

impl<T> Fetched<T> {
    pub fn is_current(&self, current: &MeasurementQuery) -> bool {
        self.query == *current
    }
}

#[derive(Clone)]
pub struct MeasurementService {
    repository: Arc<dyn MonitoringRepository>,
}

impl MeasurementService {
    pub fn new(repository: Arc<dyn MonitoringRepository>) -> Self {
        Self { repository }
    }

    /// Never fails: backend errors are logged and yield an empty first page
    pub async fn measurements(&self, query: MeasurementQuery) -> Fetched<Page<MeasurementRecord>> {
        let result = match self.repository.get_measurements(&query).await {
            Ok(page) => {
                debug!(records = page.data.len(), total = page.meta.total, "Measurements fetched");
                page
            }
            Err(e) => {
                error!(error = %e, "Error fetching measurements");
                Page::empty(1)
            }
        };
        Fetched { query, result }
    }

    /// Never fails: backend errors are logged and yield zero-filled statistics
    pub async fn statistics(&self, query: MeasurementQuery) -> Fetched<Statistics> {
        let query = query.with_page(None, None);
        let result = match self.repository.get_statistics(&query).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Error fetching statistics");
                Statistics::default()
            }
        };
        Fetched { query, result }
    }
}
