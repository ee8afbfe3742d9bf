//! Local endpoint configuration

use serde::Deserialize;
use std::path::Path;

use secretfetch_core::DEFAULT_REGION;
use secretfetch_secretsmanager::{NewSecret, SecretsManagerStorage};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Secrets created when the endpoint starts
    #[serde(default)]
    pub secrets: Vec<SeedSecret>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SeedSecret {
    pub name: String,

    pub value: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_port() -> u16 {
    4584
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Without `path`, an optional `secretfetch.{toml,json,yaml}` in the
    /// working directory is used. `SECRETFETCH__SERVER__PORT` style variables
    /// override file values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("secretfetch").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("SECRETFETCH").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Create the configured secrets, returning how many were stored
    pub fn seed(&self, storage: &SecretsManagerStorage) -> anyhow::Result<usize> {
        for secret in &self.secrets {
            storage.create_secret(
                &secret.region,
                NewSecret {
                    description: secret.description.clone(),
                    ..NewSecret::string(&secret.name, &secret.value)
                },
            )?;
        }

        Ok(self.secrets.len())
    }
}
