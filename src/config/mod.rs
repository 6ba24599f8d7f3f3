use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level YAML document: where to listen and what to route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Budget for one backend round trip. The authorization call has its own
    /// fixed budget.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// One entry of `routes:`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// `/literal`, `/:param` and a trailing `/*rest` segment are understood
    pub path: String,
    /// `http://` or `https://` base the matched path is appended to
    pub backend: String,
    /// Empty means any method
    #[serde(default)]
    pub methods: Vec<String>,
    /// Drop the literal part of `path` before forwarding
    #[serde(default)]
    pub strip_prefix: bool,
    /// Forward-auth check applied before the request reaches the backend
    #[serde(default)]
    pub auth_redirect: Option<AuthRedirectConfig>,
}

const MISSING_AUTH_URL: &str = "auth_redirect <url> not specified";

const KNOWN_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

impl RouteConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(GatewayError::Config(format!("route {:?}: {}", self.path, reason)))
        };

        if !self.path.starts_with('/') {
            return invalid("path must start with '/'".to_string());
        }
        if !(self.backend.starts_with("http://") || self.backend.starts_with("https://")) {
            return invalid(format!("backend {:?} is not an http(s) URL", self.backend));
        }
        if let Some(method) = self
            .methods
            .iter()
            .find(|m| !KNOWN_METHODS.contains(&m.to_uppercase().as_str()))
        {
            return invalid(format!("unknown method {:?}", method));
        }
        if let Some(auth_redirect) = &self.auth_redirect {
            if auth_redirect.validate().is_err() {
                return invalid(MISSING_AUTH_URL.to_string());
            }
        }
        Ok(())
    }
}

/// Forward-auth configuration
///
/// Every request matched by the owning route is replayed to `url` first. Only a
/// `200 OK` from that endpoint lets the request continue to the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRedirectConfig {
    /// Authorization endpoint URL
    #[serde(default)]
    pub url: String,
}

impl AuthRedirectConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Reject a missing authorization URL
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(GatewayError::Config(MISSING_AUTH_URL.to_string()));
        }
        Ok(())
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl GatewayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| GatewayError::Config(format!("invalid YAML: {}", e)))
    }

    /// Check every route; the first bad one is reported
    pub fn validate(&self) -> Result<()> {
        self.routes.iter().try_for_each(RouteConfig::validate)
    }

    /// Default server settings and no routes
    pub fn empty() -> Self {
        Self {
            server: ServerConfig::default(),
            routes: Vec::new(),
        }
    }
}
