use crate::types::AutoResolveStrategy;
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `HCP_COORDINATOR__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub coordination: CoordinationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
    #[serde(default = "default_auto_resolve_enabled")]
    pub auto_resolve_enabled: bool,
    #[serde(default)]
    pub auto_resolve_strategy: AutoResolveStrategy,
    #[serde(default = "default_auto_resolve_interval_secs")]
    pub auto_resolve_interval_secs: u64,
}

fn default_node_id() -> String {
    "coordinator-01".to_string()
}
fn default_expiry_sweep_interval_secs() -> u64 {
    60
}
fn default_auto_resolve_enabled() -> bool {
    false
}
fn default_auto_resolve_interval_secs() -> u64 {
    300
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
            auto_resolve_enabled: default_auto_resolve_enabled(),
            auto_resolve_strategy: AutoResolveStrategy::default(),
            auto_resolve_interval_secs: default_auto_resolve_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            coordination: CoordinationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("HCP_COORDINATOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
