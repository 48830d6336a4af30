// REST client for the measurements backend
use crate::application::auth_service::{AuthError, SIGN_IN_FAILED, SIGN_UP_FAILED, SessionStore};
use crate::application::monitoring_repository::{AuthGateway, MeasurementQuery, MonitoringRepository};
use crate::domain::auth::{AuthResponse, Credentials, Registration};
use crate::domain::catalog::WorkCenter;
use crate::domain::measurement::{MeasurementRecord, Page, Statistics};
use crate::domain::simulation::SimulatedMeasurement;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session,
        }
    }

    fn build_url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.token() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .authorized(self.client.get(url))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed with status {}: {}", url, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Auth endpoints never carry the session token
    async fn post_auth<B: Serialize + Sync>(&self, path: &str, body: &B, fallback: &str) -> Result<AuthResponse, AuthError> {
        let url = self.build_url(path, &[]);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(AuthError::Rejected(
                backend_message(&body).unwrap_or_else(|| fallback.to_string()),
            ));
        }

        Ok(response
            .json::<AuthResponse>()
            .await
            .context("Failed to parse auth response")?)
    }
}

/// `message` from an error body; validation errors send a list of messages
fn backend_message(body: &Value) -> Option<String> {
    match body.get("message")? {
        Value::String(message) => Some(message.clone()),
        Value::Array(messages) => {
            let joined: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
            (!joined.is_empty()).then(|| joined.join(", "))
        }
        _ => None,
    }
}

#[async_trait]
impl MonitoringRepository for ApiClient {
    async fn list_work_centers(&self) -> Result<Vec<WorkCenter>> {
        let url = self.build_url("/work-centers", &[]);
        self.get_json(&url).await
    }

    async fn get_measurements(&self, query: &MeasurementQuery) -> Result<Page<MeasurementRecord>> {
        let url = self.build_url("/measurements", &query.to_params());
        self.get_json(&url).await
    }

    async fn get_statistics(&self, query: &MeasurementQuery) -> Result<Statistics> {
        let url = self.build_url("/statistics", &query.to_params());
        self.get_json(&url).await
    }

    async fn post_measurement(&self, payload: &SimulatedMeasurement, api_key: &str) -> Result<()> {
        let url = self.build_url("/measurements", &[]);
        let response = self
            .authorized(self.client.post(&url))
            .header(API_KEY_HEADER, api_key)
            .json(payload)
            .send()
            .await
            .context("Failed to send measurement")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Measurement rejected with status {}: {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthGateway for ApiClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        self.post_auth("/auth/sign-in", credentials, SIGN_IN_FAILED).await
    }

    async fn sign_up(&self, registration: &Registration) -> Result<AuthResponse, AuthError> {
        self.post_auth("/auth/sign-up", registration, SIGN_UP_FAILED).await
    }

    async fn check_status(&self) -> Result<AuthResponse> {
        let url = self.build_url("/auth/check-status", &[]);
        self.get_json(&url).await
    }
}
