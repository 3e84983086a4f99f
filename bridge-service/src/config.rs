use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    pub attempt_timeout_secs: u64,
    pub subscribe_timeout_secs: u64,
    pub max_attempts: u32,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataloggerConfig {
    pub base_url: String,
    pub auth_key: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub adapter: AdapterConfig,
    pub datalogger: DataloggerConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BRIDGE_CONFIG").unwrap_or_else(|_| "bridge-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}
