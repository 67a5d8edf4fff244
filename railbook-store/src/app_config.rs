use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 { 10 }

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Where the credential file lives. `~` expands to the home directory.
    pub path: Option<String>,
}

impl SessionConfig {
    pub fn resolved_path(&self) -> PathBuf {
        let home = env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
        match self.path.as_deref() {
            Some(path) => match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => PathBuf::from(path),
            },
            None => home.join(".railbook").join("session.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_payment_window")]
    pub payment_window_seconds: u64,
    #[serde(default = "default_urgent_threshold")]
    pub urgent_threshold_seconds: u64,
    #[serde(default = "default_tick")]
    pub tick_millis: u64,
    /// Unit price used when a search row has no usable price.
    #[serde(default = "default_fallback_price")]
    pub fallback_unit_price: f64,
}

fn default_payment_window() -> u64 { 900 }
fn default_urgent_threshold() -> u64 { 300 }
fn default_tick() -> u64 { 1000 }
fn default_fallback_price() -> f64 { 20.0 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            payment_window_seconds: default_payment_window(),
            urgent_threshold_seconds: default_urgent_threshold(),
            tick_millis: default_tick(),
            fallback_unit_price: default_fallback_price(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    #[serde(default = "default_availability")]
    pub availability_ratio: f64,
    pub seed: Option<u64>,
}

fn default_availability() -> f64 { 0.7 }

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            availability_ratio: default_availability(),
            seed: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .set_default("api.base_url", "http://localhost:8080/api")?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `RAILBOOK__API__BASE_URL=https://...`
            .add_source(config::Environment::with_prefix("RAILBOOK").prefix_separator("__").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
