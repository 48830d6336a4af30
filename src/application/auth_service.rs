// Auth service - Sign in/up and session token handling
use crate::application::monitoring_repository::AuthGateway;
use crate::domain::auth::{AuthResponse, Credentials, Registration};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const SIGN_IN_FAILED: &str = "Error signing in";
pub const SIGN_UP_FAILED: &str = "Error registering user";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Backend refused the request; carries its message for the user
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Bearer token shared by every backend client
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionStore {
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn save(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }
}

#[derive(Clone)]
pub struct AuthService {
    gateway: Arc<dyn AuthGateway>,
    session: SessionStore,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn AuthGateway>, session: SessionStore) -> Self {
        Self { gateway, session }
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let response = self.gateway.sign_in(credentials).await?;
        info!(user = %response.user.email, "Signed in");
        self.session.save(response.token.clone());
        Ok(response)
    }

    pub async fn sign_up(&self, registration: &Registration) -> Result<AuthResponse, AuthError> {
        let response = self.gateway.sign_up(registration).await?;
        info!(user = %response.user.email, "Registered");
        self.session.save(response.token.clone());
        Ok(response)
    }

    /// `None` without a token; an invalid token is dropped
    pub async fn check_status(&self) -> Option<AuthResponse> {
        if !self.session.is_authenticated() {
            return None;
        }
        match self.gateway.check_status().await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, "Session check failed, clearing token");
                self.session.clear();
                None
            }
        }
    }

    /// Use a token the browser already holds. Returns true when it replaced
    /// the stored one.
    pub fn adopt_token(&self, token: &str) -> bool {
        if self.session.token().as_deref() == Some(token) {
            return false;
        }
        info!("Resuming session from cookie");
        self.session.save(token);
        true
    }

    pub fn logout(&self) {
        self.session.clear();
    }
}
