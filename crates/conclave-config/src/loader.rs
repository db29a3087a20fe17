//! Loading configuration from disk and the environment.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::ConclaveConfig;

pub const ENV_HOST: &str = "CONCLAVE_HOST";
pub const ENV_PORT: &str = "CONCLAVE_PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// `<config dir>/conclave/config.toml`, e.g. `~/.config/conclave/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("conclave").join("config.toml"))
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<ConclaveConfig, ConfigError> {
        let path = path.as_ref();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        ConclaveConfig::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `explicit` if given, otherwise from the default path when it
    /// exists, then apply environment overrides.
    pub async fn load(explicit: Option<&Path>) -> Result<ConclaveConfig, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path).await?,
            None => match Self::default_path() {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                    Self::load_from_file(&path).await?
                }
                _ => {
                    debug!("No config file found, using defaults");
                    ConclaveConfig::default()
                }
            },
        };
        apply_overrides(&mut config, |var| std::env::var(var).ok())?;
        Ok(config)
    }
}

/// Apply `CONCLAVE_HOST` / `CONCLAVE_PORT` to both the server and client
/// sections. `lookup` abstracts the environment.
pub fn apply_overrides<F>(config: &mut ConclaveConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
        config.server.host = host.clone();
        config.client.host = host;
    }
    if let Some(raw) = lookup(ENV_PORT) {
        let port = raw
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidEnv {
                var: ENV_PORT,
                value: raw.clone(),
            })?;
        config.server.port = port;
        config.client.port = port;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_apply_to_both_sections() {
        let mut config = ConclaveConfig::default();
        apply_overrides(
            &mut config,
            env(&[(ENV_HOST, "0.0.0.0"), (ENV_PORT, "9100")]),
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.client.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.client.port, 9100);
    }

    #[test]
    fn test_invalid_port_override_is_rejected() {
        let mut config = ConclaveConfig::default();
        let err = apply_overrides(&mut config, env(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_PORT, .. }));
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut config = ConclaveConfig::default();
        apply_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config, ConclaveConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9001\n\n[client]\nhost = \"10.0.0.2\"\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.client.host, "10.0.0.2");
        assert_eq!(config.client.port, 8000);
    }

    #[tokio::test]
    async fn test_load_missing_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = ConfigLoader::load_from_file(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[tokio::test]
    async fn test_load_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = ConfigLoader::load_from_file(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
