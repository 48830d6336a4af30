// Catalog domain model: work centers -> areas -> sensors
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    /// Human-readable sensor code, e.g. "S-001"
    pub sensor_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCenter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub areas: Vec<Area>,
}

/// Human-readable names for a set of selected catalog ids.
///
/// A field is `None` when nothing is selected or when the id could not be
/// found in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSelection {
    pub work_center_name: Option<String>,
    pub area_name: Option<String>,
    pub sensor_code: Option<String>,
}

/// Read-only hierarchy fetched once per session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    work_centers: Vec<WorkCenter>,
}

impl Catalog {
    pub fn new(work_centers: Vec<WorkCenter>) -> Self {
        Self { work_centers }
    }

    pub fn work_centers(&self) -> &[WorkCenter] {
        &self.work_centers
    }

    pub fn work_center(&self, work_center_id: &str) -> Option<&WorkCenter> {
        self.work_centers.iter().find(|wc| wc.id == work_center_id)
    }

    pub fn areas_by_work_center(&self, work_center_id: &str) -> &[Area] {
        self.work_center(work_center_id)
            .map(|wc| wc.areas.as_slice())
            .unwrap_or(&[])
    }

    /// Searches every work center for the area
    pub fn area(&self, area_id: &str) -> Option<&Area> {
        self.work_centers
            .iter()
            .flat_map(|wc| wc.areas.iter())
            .find(|a| a.id == area_id)
    }

    pub fn sensors_by_area(&self, area_id: &str) -> &[Sensor] {
        self.area(area_id)
            .map(|a| a.sensors.as_slice())
            .unwrap_or(&[])
    }

    /// Areas only point back to their work center through this lookup
    pub fn work_center_of_area(&self, area_id: &str) -> Option<&WorkCenter> {
        self.work_centers
            .iter()
            .find(|wc| wc.areas.iter().any(|a| a.id == area_id))
    }

    pub fn area_belongs_to(&self, area_id: &str, work_center_id: &str) -> bool {
        self.work_center_of_area(area_id)
            .is_some_and(|wc| wc.id == work_center_id)
    }

    pub fn sensor_belongs_to(&self, sensor_id: &str, area_id: &str) -> bool {
        self.sensors_by_area(area_id).iter().any(|s| s.id == sensor_id)
    }

    /// Map selected ids to the names carried by live events.
    ///
    /// Areas are only looked up under the selected work center and sensors
    /// under the selected area; anything that does not resolve is left unset.
    pub fn resolve(
        &self,
        work_center_id: Option<&str>,
        area_id: Option<&str>,
        sensor_id: Option<&str>,
    ) -> ResolvedSelection {
        let work_center = work_center_id.and_then(|id| self.work_center(id));
        let area = match (work_center, area_id) {
            (Some(wc), Some(id)) => wc.areas.iter().find(|a| a.id == id),
            _ => None,
        };
        let sensor = match (area, sensor_id) {
            (Some(a), Some(id)) => a.sensors.iter().find(|s| s.id == id),
            _ => None,
        };

        ResolvedSelection {
            work_center_name: work_center.map(|wc| wc.name.clone()),
            area_name: area.map(|a| a.name.clone()),
            sensor_code: sensor.map(|s| s.sensor_id.clone()),
        }
    }
}
