use crate::application::buffer::LIVE_BUFFER_CAPACITY;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub dashboard: DashboardSettings,
    pub live: LiveSettings,
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    /// REST base, including any `/api` prefix
    pub base_url: String,
    pub ws_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    pub bind: String,
    /// Marks the session cookie `Secure`
    pub production: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LiveSettings {
    pub buffer_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorSettings {
    pub api_key: String,
    pub interval_seconds: u64,
    pub voltage_base: f64,
    pub current_base: f64,
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("api.base_url", "http://localhost:3000/api")?
        .set_default("api.ws_url", "ws://localhost:3000/ws")?
        .set_default("dashboard.bind", "0.0.0.0:8080")?
        .set_default("dashboard.production", false)?
        .set_default("live.buffer_capacity", LIVE_BUFFER_CAPACITY as u64)?
        .set_default("simulator.api_key", "")?
        .set_default("simulator.interval_seconds", 5)?
        .set_default("simulator.voltage_base", 110.0)?
        .set_default("simulator.current_base", 25.0)?)
}

/// Defaults, then `config/monitor.toml` if present, then `MONITOR__*` env vars
/// (e.g. `MONITOR__API__BASE_URL`).
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = builder()?
        .add_source(config::File::with_name("config/monitor").required(false))
        .add_source(config::Environment::with_prefix("MONITOR").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
