use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::constants::{
    DEFAULT_MODEL_URI, DEFAULT_OUTLIER_QUANTILE, DEFAULT_PORT, DEFAULT_REGISTRY_ROOT, DEFAULT_SEED,
    DEFAULT_TEST_FRACTION,
};
use crate::error::{PricerError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub server: ServerConfig,
    pub training: TrainingConfig,
}

/// Where models live. With `endpoint` set the HTTP registry is used,
/// otherwise the filesystem registry under `root`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub model_uri: String,
    pub root: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: None,
            token: None,
            model_uri: DEFAULT_MODEL_URI.to_string(),
            root: DEFAULT_REGISTRY_ROOT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub outlier_quantile: f64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            outlier_quantile: DEFAULT_OUTLIER_QUANTILE,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl Config {
    /// Load `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PricerError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `PRICER_*` variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PRICER_REGISTRY_ENDPOINT") {
            self.registry.endpoint = Some(v);
        }
        if let Some(v) = lookup("PRICER_REGISTRY_USERNAME") {
            self.registry.username = Some(v);
        }
        if let Some(v) = lookup("PRICER_REGISTRY_TOKEN") {
            self.registry.token = Some(v);
        }
        if let Some(v) = lookup("PRICER_MODEL_URI") {
            self.registry.model_uri = v;
        }
        if let Some(v) = lookup("PRICER_REGISTRY_ROOT") {
            self.registry.root = v;
        }
        if let Some(v) = lookup("PRICER_PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| PricerError::Config(format!("PRICER_PORT is not a port: {v}")))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let q = self.training.outlier_quantile;
        if !(q > 0.0 && q <= 1.0) {
            return Err(PricerError::Config(format!(
                "training.outlier_quantile must be in (0, 1], got {q}"
            )));
        }
        let f = self.training.test_fraction;
        if !(0.0..1.0).contains(&f) {
            return Err(PricerError::Config(format!(
                "training.test_fraction must be in [0, 1), got {f}"
            )));
        }
        Ok(())
    }
}
