// Authentication domain model
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "token";
pub const SESSION_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
pub const LOGIN_PATH: &str = "/auth/login";
pub const AUTH_PATHS: [&str; 2] = [LOGIN_PATH, "/auth/register"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Browser session cookie holding the bearer token
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub token: String,
    pub secure: bool,
}

impl SessionCookie {
    pub fn new(token: impl Into<String>, secure: bool) -> Self {
        Self {
            token: token.into(),
            secure,
        }
    }

    pub fn to_header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Strict",
            SESSION_COOKIE, self.token, SESSION_MAX_AGE_SECS
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Header value that makes the browser drop the cookie
    pub fn expired() -> String {
        format!("{}=; Path=/; Max-Age=0; SameSite=Strict", SESSION_COOKIE)
    }
}

/// Extract the session token from a `Cookie` request header
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Allow,
    RedirectHome,
    RedirectLogin { callback_url: String },
}

/// Route protection rules for dashboard pages
pub fn route_access(path: &str, has_session: bool) -> RouteAccess {
    let is_auth_path = AUTH_PATHS.iter().any(|p| path.starts_with(p));

    if has_session && is_auth_path {
        return RouteAccess::RedirectHome;
    }
    if !has_session && !is_auth_path {
        return RouteAccess::RedirectLogin {
            callback_url: path.to_string(),
        };
    }
    RouteAccess::Allow
}
