//! Configuration for the wfdispatch server
//!
//! Values come from an optional file named by `WFDISPATCH_CONFIG`, then from
//! `WFDISPATCH_*` environment variables (`WFDISPATCH_BACKEND_URL`, ...).

use config::{builder::DefaultState, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

/// Environment variable naming the optional config file
pub const CONFIG_FILE_ENV: &str = "WFDISPATCH_CONFIG";

/// Prefix of the environment variables read by [`ServerConfig::load`]
pub const ENV_PREFIX: &str = "WFDISPATCH";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// `memory://` or the base URL of the Argo Server
    #[serde(default)]
    pub backend_url: String,

    /// Kubernetes API base URL for pod logs; defaults to `backend_url`
    #[serde(default)]
    pub kube_api_url: Option<String>,

    /// Bearer token for the backend
    #[serde(default)]
    pub backend_token: Option<String>,

    /// Per-request timeout of the backend client
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Prefix of user namespaces
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Group a user must belong to before getting a namespace
    #[serde(default)]
    pub required_group: Option<String>,

    /// Header carrying the identity token
    #[serde(default = "default_auth_header")]
    pub auth_header_name: String,

    /// Claim holding the login name
    #[serde(default = "default_username_claim")]
    pub username_claim: String,

    /// Claim holding the group memberships
    #[serde(default = "default_groups_claim")]
    pub groups_claim: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub log_json: bool,

    /// Node log fetches in flight per request
    #[serde(default = "default_log_fetch_concurrency")]
    pub log_fetch_concurrency: usize,

    /// Container whose logs are collected
    #[serde(default = "default_log_container")]
    pub log_container: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_namespace_prefix() -> String {
    "nublado".to_string()
}

fn default_auth_header() -> String {
    "X-Portal-Authorization".to_string()
}

fn default_username_claim() -> String {
    "uid".to_string()
}

fn default_groups_claim() -> String {
    "isMemberOf".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_fetch_concurrency() -> usize {
    wfdispatch_core::DEFAULT_LOG_CONCURRENCY
}

fn default_log_container() -> String {
    wfdispatch_core::DEFAULT_LOG_CONTAINER.to_string()
}

impl ServerConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> ServerResult<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = env::var(CONFIG_FILE_ENV) {
            info!(%path, "Reading configuration file");
            builder = builder.add_source(File::with_name(&path).required(false));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        Self::from_builder(builder)
    }

    /// Build and validate a configuration from prepared sources
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> ServerResult<Self> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        info!("Loaded server configuration");
        Ok(config)
    }

    /// Base URL for pod log requests
    pub fn kube_api_url(&self) -> &str {
        self.kube_api_url.as_deref().unwrap_or(&self.backend_url)
    }

    /// Whether the in-memory backend is selected
    pub fn uses_memory_backend(&self) -> bool {
        self.backend_url.starts_with("memory://")
    }

    fn validate(&self) -> ServerResult<()> {
        if self.backend_url.is_empty() {
            return Err(ServerError::ConfigError("Backend URL is required".to_string()));
        }

        if !self.uses_memory_backend()
            && !self.backend_url.starts_with("http://")
            && !self.backend_url.starts_with("https://")
        {
            return Err(ServerError::ConfigError(format!(
                "Unsupported backend URL: {}",
                self.backend_url
            )));
        }

        if self.auth_header_name.trim().is_empty() {
            return Err(ServerError::ConfigError("Auth header name must not be empty".to_string()));
        }

        if self.log_fetch_concurrency == 0 {
            warn!("log_fetch_concurrency is 0, fetching node logs sequentially");
        }

        if !self.uses_memory_backend() && self.backend_token.is_none() {
            warn!("No backend token provided - backend requests will be unauthenticated!");
        }

        if self.required_group.is_none() {
            warn!("No required group configured - every authenticated user gets a namespace");
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            backend_url: String::new(),
            kube_api_url: None,
            backend_token: None,
            request_timeout_seconds: default_request_timeout(),
            namespace_prefix: default_namespace_prefix(),
            required_group: None,
            auth_header_name: default_auth_header(),
            username_claim: default_username_claim(),
            groups_claim: default_groups_claim(),
            log_level: default_log_level(),
            log_json: false,
            log_fetch_concurrency: default_log_fetch_concurrency(),
            log_container: default_log_container(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> ServerResult<ServerConfig> {
        ServerConfig::from_builder(config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_toml(r#"backend_url = "memory://""#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.namespace_prefix, "nublado");
        assert_eq!(config.auth_header_name, "X-Portal-Authorization");
        assert_eq!(config.username_claim, "uid");
        assert_eq!(config.groups_claim, "isMemberOf");
        assert_eq!(config.log_fetch_concurrency, 4);
        assert_eq!(config.log_container, "main");
        assert_eq!(config.request_timeout_seconds, 30);
        assert!(!config.log_json);
        assert!(config.uses_memory_backend());
    }

    #[test]
    fn test_backend_url_required() {
        let err = from_toml(r#"port = 9000"#).unwrap_err();
        assert!(matches!(err, ServerError::ConfigError(msg) if msg.contains("Backend URL")));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = from_toml(r#"backend_url = "ftp://argo""#).unwrap_err();
        assert!(matches!(err, ServerError::ConfigError(_)));
    }

    #[test]
    fn test_kube_api_url_falls_back_to_backend() {
        let config = from_toml(r#"backend_url = "https://argo.example.com""#).unwrap();
        assert_eq!(config.kube_api_url(), "https://argo.example.com");

        let config = from_toml(
            r#"
            backend_url = "https://argo.example.com"
            kube_api_url = "https://kubernetes.default.svc"
            "#,
        )
        .unwrap();
        assert_eq!(config.kube_api_url(), "https://kubernetes.default.svc");
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let err = from_toml(
            r#"
            backend_url = "memory://"
            port = "not-a-port"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::ConfigError(_)));
    }
}
