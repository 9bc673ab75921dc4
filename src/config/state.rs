// Application state module
// Holds the loaded configuration and the request environment

use super::types::Config;
use crate::store::SharedStore;

/// Per-request environment
///
/// Built once at startup and passed by reference into every router call.
/// Nothing in the request path mutates it.
pub struct Env {
    /// Store handle
    pub store: SharedStore,
    /// Expected bearer token
    pub auth_token: String,
    /// Environment label, cosmetic
    pub environment: String,
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("auth_token", &"<redacted>")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Application state
pub struct AppState {
    pub config: Config,
    pub env: Env,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore) -> Self {
        let env = config.env(store);
        Self { config, env }
    }
}
