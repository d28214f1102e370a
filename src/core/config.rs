use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

use super::client::{FailurePolicy, Provider};

pub const DEFAULT_SYMBOLS: [&str; 5] = ["USD", "EUR", "BRL", "GBP", "AUD"];
const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub on_failure: Option<FailurePolicy>,
}

impl ProviderConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ProviderConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            headers: BTreeMap::new(),
            on_failure: None,
        }
    }

    pub fn default_for(provider: Provider) -> Self {
        match provider {
            Provider::Fiat => Self::new("https://api.exchangeratesapi.io/v1/latest", ""),
            Provider::Crypto => Self::new(
                "https://pro-api.coinmarketcap.com/v2/tools/price-conversion",
                "",
            ),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fiat: Option<ProviderConfig>,
    pub crypto: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fiat: Some(ProviderConfig::default_for(Provider::Fiat)),
            crypto: Some(ProviderConfig::default_for(Provider::Crypto)),
        }
    }
}

impl ProvidersConfig {
    /// Settings for `provider`, falling back to its public endpoint.
    pub fn get(&self, provider: Provider) -> ProviderConfig {
        let configured = match provider {
            Provider::Fiat => self.fiat.as_ref(),
            Provider::Crypto => self.crypto.as_ref(),
        };
        configured
            .cloned()
            .unwrap_or_else(|| ProviderConfig::default_for(provider))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            symbols: default_symbols(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "knap", "knap")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
