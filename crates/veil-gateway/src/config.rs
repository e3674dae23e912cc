//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use veil_storage::MountConfig;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL; derived from request headers when empty
    pub site_url: String,
    /// Sign every link proxied through this server
    pub sign_all: bool,
    /// Link signing secret; a random one is generated when empty
    pub token: String,
    /// Lifetime of signed links in hours, 0 for no expiry
    pub link_expiration_hours: u64,
    /// Rate limit (requests per second per client)
    pub rate_limit_rps: u32,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Mounted storages
    pub mounts: Vec<MountConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5244,
            site_url: String::new(),
            sign_all: true,
            token: String::new(),
            link_expiration_hours: 0,
            rate_limit_rps: 100,
            request_timeout_secs: 30,
            cors_enabled: true,
            mounts: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration: defaults, then `path` (TOML, JSON or YAML by
    /// extension), then `VEIL_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `VEIL_RATE_LIMIT_RPS=10`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VEIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: GatewayConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:5244");
        assert!(config.sign_all);
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
port = 8080
site_url = "https://files.example"
token = "secret-token"

[[mounts]]
driver = "url_tree"
mount_path = "/web"

[[mounts]]
driver = "crypt"
mount_path = "/vault"
remote_path = "/web/encrypted"
password = "secret"
"#
        )
        .unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.site_url, "https://files.example");
        assert_eq!(config.token, "secret-token");
        assert_eq!(config.rate_limit_rps, 100);
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[1].mount_path(), "/vault");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GatewayConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
