//! YAML endpoint configuration.
//!
//! The configuration file is a mapping from a DBMS logical name to its
//! connection parameters:
//!
//! ```yaml
//! pg:
//!   type: psql
//!   server: localhost
//!   port: 5432
//!   user: postgres
//!   password: secret
//! warehouse:
//!   type: mysql
//!   server: db.internal
//!   user: app
//!   password: secret
//! local:
//!   type: sqlite
//!   path: ./local.db
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::database::DbmsKind;
use crate::error::EngineError;

/// Connection parameters of one configured DBMS endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(rename = "type")]
    pub kind: DbmsKind,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Accepted for compatibility with ODBC-style configs; unused.
    #[serde(default)]
    pub driver: Option<String>,
    /// SQLite database file.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            EngineError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Config, EngineError> {
        serde_yaml::from_str(text)
            .map_err(|err| EngineError::Config(format!("invalid configuration: {err}")))
    }
}
