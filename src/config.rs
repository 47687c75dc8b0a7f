// Configuration loading: YAML file plus environment overrides for deploy knobs.
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Production deployments mark the identity cookie secure-transport-only.
    #[serde(default)]
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8600,
            production: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Usernames inserted at startup so login works on a fresh database.
    #[serde(default)]
    pub seed_users: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            seed_users: vec!["testuser".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub app_name: String,
    pub base_url: String,
    pub invoke_timeout_s: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            app_name: "parley".to_string(),
            base_url: "http://127.0.0.1:8601".to_string(),
            invoke_timeout_s: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/parley.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

pub fn load_config() -> Config {
    let path =
        env::var("PARLEY_CONFIG_PATH").unwrap_or_else(|_| "config/parley.yaml".to_string());
    let mut config = read_config_file(Path::new(&path));
    apply_env_overrides(&mut config);
    config
}

fn read_config_file(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!("failed to read config file {}: {err}", path.display());
            return Config::default();
        }
    };
    match serde_yaml::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!("invalid config file {}: {err}", path.display());
            Config::default()
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    // Environment overrides keep containerized deployments config-file free.
    if let Ok(host) = env::var("PARLEY_HOST") {
        if !host.trim().is_empty() {
            config.server.host = host.trim().to_string();
        }
    }
    if let Some(port) = env::var("PARLEY_PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        config.server.port = port;
    }
    if let Ok(url) = env::var("PARLEY_RUNTIME_URL") {
        if !url.trim().is_empty() {
            config.runtime.base_url = url.trim().to_string();
        }
    }
    if let Ok(flag) = env::var("PARLEY_PRODUCTION") {
        config.server.production = matches!(flag.trim(), "1" | "true" | "yes");
    }
}
