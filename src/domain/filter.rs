// Filter selection domain model
use super::catalog::Catalog;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown work center {work_center_id}")]
    UnknownWorkCenter { work_center_id: String },
    #[error("area {area_id} does not belong to work center {work_center_id}")]
    AreaNotInWorkCenter { area_id: String, work_center_id: String },
    #[error("sensor {sensor_id} does not belong to area {area_id}")]
    SensorNotInArea { sensor_id: String, area_id: String },
    #[error("select a work center before selecting an area")]
    NoWorkCenterSelected,
    #[error("select an area before selecting a sensor")]
    NoAreaSelected,
    #[error("date range starts after it ends")]
    InvertedDateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, FilterError> {
        if from > to {
            return Err(FilterError::InvertedDateRange);
        }
        Ok(Self { from, to })
    }
}

/// Filter announced to the backend over the push channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_center_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
}

/// The user's current selection. Child selections are reset whenever a
/// parent changes so an area always belongs to the selected work center and
/// a sensor always belongs to the selected area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    date_range: Option<DateRange>,
    selected_work_center: Option<String>,
    selected_area: Option<String>,
    selected_sensor: Option<String>,
}

impl FilterSelection {
    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn work_center(&self) -> Option<&str> {
        self.selected_work_center.as_deref()
    }

    pub fn area(&self) -> Option<&str> {
        self.selected_area.as_deref()
    }

    pub fn sensor(&self) -> Option<&str> {
        self.selected_sensor.as_deref()
    }

    pub fn set_date_range(&mut self, date_range: Option<DateRange>) {
        self.date_range = date_range;
    }

    /// Ids are only checked once a catalog has been loaded
    pub fn set_work_center(&mut self, work_center_id: Option<String>, catalog: &Catalog) -> Result<(), FilterError> {
        if let Some(id) = &work_center_id {
            if !catalog.work_centers().is_empty() && catalog.work_center(id).is_none() {
                return Err(FilterError::UnknownWorkCenter {
                    work_center_id: id.clone(),
                });
            }
        }
        if self.selected_work_center == work_center_id {
            return Ok(());
        }
        self.selected_work_center = work_center_id;

        let area_still_valid = match (&self.selected_work_center, &self.selected_area) {
            (Some(wc), Some(area)) => catalog.area_belongs_to(area, wc),
            _ => false,
        };
        if !area_still_valid {
            self.selected_area = None;
            self.selected_sensor = None;
        }
        Ok(())
    }

    pub fn set_area(&mut self, area_id: Option<String>, catalog: &Catalog) -> Result<(), FilterError> {
        if let Some(area) = &area_id {
            let work_center = self
                .selected_work_center
                .as_deref()
                .ok_or(FilterError::NoWorkCenterSelected)?;
            if !catalog.area_belongs_to(area, work_center) {
                return Err(FilterError::AreaNotInWorkCenter {
                    area_id: area.clone(),
                    work_center_id: work_center.to_string(),
                });
            }
        }
        if self.selected_area == area_id {
            return Ok(());
        }
        self.selected_area = area_id;

        let sensor_still_valid = match (&self.selected_area, &self.selected_sensor) {
            (Some(area), Some(sensor)) => catalog.sensor_belongs_to(sensor, area),
            _ => false,
        };
        if !sensor_still_valid {
            self.selected_sensor = None;
        }
        Ok(())
    }

    pub fn set_sensor(&mut self, sensor_id: Option<String>, catalog: &Catalog) -> Result<(), FilterError> {
        if let Some(sensor) = &sensor_id {
            let area = self.selected_area.as_deref().ok_or(FilterError::NoAreaSelected)?;
            if !catalog.sensor_belongs_to(sensor, area) {
                return Err(FilterError::SensorNotInArea {
                    sensor_id: sensor.clone(),
                    area_id: area.to_string(),
                });
            }
        }
        self.selected_sensor = sensor_id;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn subscription_filter(&self) -> SubscriptionFilter {
        SubscriptionFilter {
            work_center_id: self.selected_work_center.clone(),
            area_id: self.selected_area.clone(),
            sensor_id: self.selected_sensor.clone(),
        }
    }
}

/// Desired selection submitted by the dashboard, applied parent-first.
///
/// The update replaces the whole selection: a field left out is cleared, so
/// `{"from": "2024-01-01"}` alone drops any selected work center, area and
/// sensor. Send every field that should stay selected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUpdate {
    pub work_center_id: Option<String>,
    pub area_id: Option<String>,
    pub sensor_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FilterUpdate {
    /// Applies to a copy so a rejected update leaves `selection` untouched.
    pub fn apply(self, selection: &FilterSelection, catalog: &Catalog) -> Result<FilterSelection, FilterError> {
        let mut next = selection.clone();
        next.set_work_center(self.work_center_id, catalog)?;
        next.set_area(self.area_id, catalog)?;
        next.set_sensor(self.sensor_id, catalog)?;

        let date_range = match (self.from, self.to) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to)?),
            (Some(day), None) | (None, Some(day)) => Some(DateRange::new(day, day)?),
            (None, None) => None,
        };
        next.set_date_range(date_range);
        Ok(next)
    }
}
