use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "pn.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct PnConfig {
    #[serde(default)]
    pub alternator: AlternatorConfig,
    #[serde(default)]
    pub multiplicator: MultiplicatorConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AlternatorConfig {
    /// Critical sections to complete across all actors before stopping.
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    #[serde(default)]
    pub fair: bool,
}

impl Default for AlternatorConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            fair: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MultiplicatorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_true")]
    pub fair: bool,
}

impl Default for MultiplicatorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            fair: default_true(),
        }
    }
}

impl PnConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

fn default_rounds() -> usize {
    30
}

fn default_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}
