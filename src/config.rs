//! Configuration management for the catalog client

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// How authentication payloads (register, login, send-code) are put on the wire
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthPayload {
    /// Fields are sent as URL query parameters (what the deployed API expects)
    Query,
    /// Fields are sent as a JSON request body
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub auth_payload: AuthPayload,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EndpointsConfig {
    pub check_email: String,
    pub register: String,
    pub send_code: String,
    pub login: String,
    /// Token refresh endpoint; recovery on 401 is skipped when unset
    pub refresh: Option<String>,
    pub me: String,
    pub books: String,
    pub genres: String,
    pub my_borrows: String,
    pub my_profile: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// File backing the persisted session; in-memory only when unset
    pub path: Option<String>,
    pub token_key: String,
    pub user_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    pub login: String,
    /// Routes reachable without a session; no login redirect is issued from these
    pub public: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment variables with prefix CATALOG_ (CATALOG_API__BASE_URL, ...)
            .add_source(
                Environment::with_prefix("CATALOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.base_url", env::var("API_BASE_URL").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Configuration pointing at the given API, everything else defaulted
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.api.base_url = base_url.into();
        config
    }

    /// True when `path` is reachable without a session
    pub fn is_public_route(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = path.trim_end_matches('/');
        self.routes
            .public
            .iter()
            .any(|route| route.trim_end_matches('/') == path)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 15,
            auth_payload: AuthPayload::Query,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            check_email: "/auth/check-email".to_string(),
            register: "/auth/register".to_string(),
            send_code: "/auth/send-code".to_string(),
            login: "/auth/login".to_string(),
            refresh: None,
            me: "/auth/me".to_string(),
            books: "/books".to_string(),
            genres: "/genres".to_string(),
            my_borrows: "/users/me/borrows".to_string(),
            my_profile: "/users/me".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            token_key: "token".to_string(),
            user_key: "user".to_string(),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            public: vec!["/login".to_string(), "/register".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
