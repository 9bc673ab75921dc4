// Configuration module entry point
// Loads configuration and builds the per-request environment

mod state;
mod types;

use std::net::SocketAddr;

use crate::store::SharedStore;

// Re-export public types
pub use state::{AppState, Env};
pub use types::{Config, StoreBackend, StoreConfig};

/// Environment variable naming the config file (without extension)
const CONFIG_PATH_VAR: &str = "SECRETS_SYNC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the file named by `SECRETS_SYNC_CONFIG`
    /// (default "config") and `SECRETS_SYNC__*` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SECRETS_SYNC").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        config::Config::builder()
            .set_default("environment", "development")?
            .set_default("auth.token", "")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8787)?
            .set_default("store.backend", "file")?
            .set_default("store.path", "data/secrets.toml")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.max_body_size", 1_048_576) // 1MB
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Build the immutable request environment around `store`
    pub fn env(&self, store: SharedStore) -> Env {
        Env {
            store,
            auth_token: self.auth.token.clone(),
            environment: self.environment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_toml(content: &str) -> Config {
        Config::builder()
            .unwrap()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = load_toml("");
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.auth.token, "");
        assert_eq!(cfg.server.port, 8787);
        assert_eq!(cfg.store.backend, StoreBackend::File);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.http.max_body_size, 1_048_576);
        assert!(cfg.server.workers.is_none());
    }

    #[test]
    fn test_file_overrides() {
        let cfg = load_toml(
            r#"
            environment = "production"

            [auth]
            token = "s3cret"

            [server]
            host = "0.0.0.0"
            port = 9000
            workers = 2

            [store]
            backend = "memory"
            "#,
        );
        assert_eq!(cfg.environment, "production");
        assert_eq!(cfg.auth.token, "s3cret");
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.socket_addr().unwrap(), "0.0.0.0:9000".parse().unwrap());
    }

    // The only test that sets SECRETS_SYNC variables; other tests that go
    // through load_from overwrite auth.token and environment afterwards.
    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(
            &path,
            r#"
            environment = "staging"

            [auth]
            token = "from-file"

            [server]
            port = 9100

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.environment, "staging");
        assert_eq!(cfg.auth.token, "from-file");
        assert_eq!(cfg.server.port, 9100);

        std::env::set_var("SECRETS_SYNC__AUTH__TOKEN", "from-env");
        std::env::set_var("SECRETS_SYNC__ENVIRONMENT", "production");
        let overridden = Config::load_from(path.to_str().unwrap());

        // File named by SECRETS_SYNC_CONFIG, extension resolved by the loader
        std::env::set_var(CONFIG_PATH_VAR, dir.path().join("service"));
        let selected = Config::load();

        std::env::remove_var("SECRETS_SYNC__AUTH__TOKEN");
        std::env::remove_var("SECRETS_SYNC__ENVIRONMENT");
        std::env::remove_var(CONFIG_PATH_VAR);

        let overridden = overridden.unwrap();
        assert_eq!(overridden.auth.token, "from-env");
        assert_eq!(overridden.environment, "production");
        assert_eq!(overridden.server.port, 9100);
        assert_eq!(overridden.store.backend, StoreBackend::Memory);

        let selected = selected.unwrap();
        assert_eq!(selected.auth.token, "from-env");
        assert_eq!(selected.server.port, 9100);
        assert_eq!(selected.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_invalid_address() {
        let mut cfg = load_toml("");
        cfg.server.host = "not a host".to_string();
        assert!(cfg.socket_addr().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = load_toml("[auth]\ntoken = \"hunter2\"");
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
