//! Runtime settings.
//!
//! Read in order of increasing precedence from built-in defaults, an optional
//! settings file (`layerstack.toml` in the working directory unless a path is
//! given) and `LAYERSTACK_*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;
use crate::stack::ReseedPolicy;

pub const DEFAULT_SETTINGS_FILE: &str = "layerstack";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// SQLite file holding committed layers. Layers only live in memory when
    /// unset.
    #[serde(default)]
    pub database: Option<String>,
    pub log_filter: String,
    pub reseed: ReseedPolicy,
}

impl Settings {
    /// Load settings. An explicitly given file has to exist, the default one
    /// does not.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("log_filter", "info")?
            .set_default("reseed", "seed")?
            .add_source(File::with_name(path.unwrap_or(DEFAULT_SETTINGS_FILE)).required(path.is_some()))
            .add_source(Environment::with_prefix("LAYERSTACK"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
}
