// Simulation domain model
use crate::domain::catalog::ResolvedSelection;
use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_VOLTAGE_BASE: f64 = 110.0;
pub const DEFAULT_CURRENT_BASE: f64 = 25.0;
pub const VOLTAGE_VARIANCE_PCT: f64 = 8.0;
pub const CURRENT_VARIANCE_PCT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub work_center: String,
    pub area: Option<String>,
    pub sensor_id: Option<String>,
    pub interval_seconds: u64,
    pub voltage_base: Option<f64>,
    pub current_base: Option<f64>,
    #[serde(skip_serializing)]
    pub api_key: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Select a work center, area and sensor before starting the simulation")]
    IncompleteSelection,
}

impl SimulationConfig {
    /// Target the resolved names of a fully selected sensor
    pub fn for_selection(
        selection: &ResolvedSelection,
        interval_seconds: u64,
        api_key: impl Into<String>,
    ) -> Result<Self, SimulationError> {
        let (Some(work_center), Some(area), Some(sensor)) = (
            &selection.work_center_name,
            &selection.area_name,
            &selection.sensor_code,
        ) else {
            return Err(SimulationError::IncompleteSelection);
        };

        Ok(Self {
            work_center: work_center.clone(),
            area: Some(area.clone()),
            sensor_id: Some(sensor.clone()),
            interval_seconds,
            voltage_base: None,
            current_base: None,
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub is_running: bool,
    pub last_sent: Option<DateTime<Local>>,
    pub count: u64,
}

/// Body of `POST /measurements`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedMeasurement {
    pub work_center: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    pub date: String,
    pub time: String,
    pub voltage: f64,
    pub current: f64,
}

/// Uniform jitter in `[base - base*pct/100, base + base*pct/100]`
pub fn random_variation<R: Rng + ?Sized>(rng: &mut R, base: f64, variance_pct: f64) -> f64 {
    let variance = base * variance_pct / 100.0;
    base + (rng.r#gen::<f64>() * 2.0 - 1.0) * variance
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl SimulatedMeasurement {
    pub fn synthesize<R: Rng + ?Sized>(config: &SimulationConfig, now: DateTime<Local>, rng: &mut R) -> Self {
        let voltage_base = config.voltage_base.unwrap_or(DEFAULT_VOLTAGE_BASE);
        let current_base = config.current_base.unwrap_or(DEFAULT_CURRENT_BASE);

        Self {
            work_center: config.work_center.clone(),
            area: config.area.clone(),
            sensor_id: config.sensor_id.clone(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M").to_string(),
            voltage: round2(random_variation(rng, voltage_base, VOLTAGE_VARIANCE_PCT)),
            current: round2(random_variation(rng, current_base, CURRENT_VARIANCE_PCT)),
        }
    }
}
