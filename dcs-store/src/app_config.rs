use dcs_core::CheckinRules;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Local cache; the in-memory cache is used when this section is absent
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub checkin: CheckinRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String { "dcs".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,
}

fn default_probe_interval() -> u64 { 15 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: default_probe_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Workstation-specific overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `DCS_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("DCS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
