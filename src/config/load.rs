//! Configuration loading from files.
//!
//! This module handles reading and parsing the site file, then layering
//! `FOLIO_*` environment variables over the top-level metadata keys.

use std::path::Path;

use config::Environment;

use super::{ConfigError, SiteConfig};
use crate::item::Fields;

pub const DEFAULT_CONFIG_FILE: &str = "folio.yaml";

/// `FOLIO_URL=https://example.com` overrides `metadata.url`.
pub const ENV_PREFIX: &str = "FOLIO";

impl SiteConfig {
    /// Load the config from the command line argument, defaulting to `folio.yaml`
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        Self::load_from_file(&config_file)
    }

    /// Load the config from a file path, applying environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: &Path, env: Environment) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut site: SiteConfig = if content.trim().is_empty() {
            SiteConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        let overrides = env_overrides(env)?;
        if !overrides.is_empty() {
            tracing::debug!(
                keys = ?overrides.keys().collect::<Vec<_>>(),
                "applying environment overrides"
            );
        }
        site.metadata.extend(overrides);

        Ok(site)
    }
}

/// Top-level metadata values taken from the environment. Keys are lowercased
/// with the prefix removed; scalar values are parsed where possible.
fn env_overrides(env: Environment) -> Result<Fields, ConfigError> {
    Ok(config::Config::builder()
        .add_source(env.try_parsing(true))
        .build()?
        .try_deserialize::<Fields>()?)
}
