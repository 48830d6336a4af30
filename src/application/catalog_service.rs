// Catalog service - Work center hierarchy fetched once per session
use crate::application::monitoring_repository::MonitoringRepository;
use crate::domain::catalog::{Area, Catalog, ResolvedSelection, Sensor};
use crate::domain::filter::FilterSelection;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

pub struct CatalogService {
    repository: Arc<dyn MonitoringRepository>,
    catalog: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn MonitoringRepository>) -> Self {
        Self {
            repository,
            catalog: RwLock::new(None),
        }
    }

    /// Fetch the catalog unless it is already loaded
    pub async fn load(&self) {
        if self.is_loaded() {
            return;
        }
        self.reload().await;
    }

    /// Refetch unconditionally; a failed fetch keeps the previous catalog
    pub async fn reload(&self) {
        match self.repository.list_work_centers().await {
            Ok(work_centers) => {
                info!(work_centers = work_centers.len(), "Catalog loaded");
                *self.catalog.write() = Some(Arc::new(Catalog::new(work_centers)));
            }
            Err(e) => {
                error!(error = %e, "Failed to load work centers");
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.catalog.read().is_some()
    }

    /// Current catalog, empty until the first successful load
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().clone().unwrap_or_default()
    }

    pub fn areas_by_work_center(&self, work_center_id: &str) -> Vec<Area> {
        self.snapshot().areas_by_work_center(work_center_id).to_vec()
    }

    pub fn sensors_by_area(&self, area_id: &str) -> Vec<Sensor> {
        self.snapshot().sensors_by_area(area_id).to_vec()
    }

    pub fn resolve(&self, selection: &FilterSelection) -> ResolvedSelection {
        self.snapshot()
            .resolve(selection.work_center(), selection.area(), selection.sensor())
    }
}
