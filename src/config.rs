use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub port: u16,
    pub database: Database,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    /// Maximum size of a request body in bytes.
    pub max_content_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_content_size: 1024 * 1024,
        }
    }
}

impl Config {
    /// Read and parse a TOML config file.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&source)
    }

    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(source).context("failed to deserialize config")?;
        Ok(Config {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            ..config
        })
    }
}
