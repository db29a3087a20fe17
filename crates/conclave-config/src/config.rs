//! Root configuration document.

use serde::{Deserialize, Serialize};

use crate::components::{ClientConfig, ServerConfig};

/// Root of `config.toml`. Every table and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConclaveConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl ConclaveConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
