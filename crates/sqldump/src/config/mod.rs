//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{DumpError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Every configured database: `source.database` first, then
    /// `source.databases` in order, without duplicates.
    pub fn database_names(&self) -> Vec<&str> {
        let mut names = vec![self.source.database.as_str()];
        for name in &self.source.databases {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }
        names
    }

    /// The configuration narrowed to one configured database.
    pub fn for_database(&self, name: &str) -> Result<Config> {
        if !self.database_names().contains(&name) {
            return Err(DumpError::Config(format!(
                "Database '{}' is not configured (configured: {})",
                name,
                self.database_names().join(", ")
            )));
        }
        let mut config = self.clone();
        config.source.database = name.to_string();
        config.source.databases.clear();
        Ok(config)
    }

    /// One configuration per database to work on: only `name` when given,
    /// otherwise every configured database.
    pub fn select_databases(&self, name: Option<&str>) -> Result<Vec<Config>> {
        match name {
            Some(name) => Ok(vec![self.for_database(name)?]),
            None => self
                .database_names()
                .into_iter()
                .map(|n| self.for_database(n))
                .collect(),
        }
    }
}

impl SourceConfig {
    /// Connection URL for the source, with the password masked.
    ///
    /// Only used for log lines; the driver connects with structured options.
    pub fn display_url(&self) -> String {
        format!(
            "{}://{}:***@{}:{}/{}",
            self.r#type, self.user, self.host, self.port, self.database
        )
    }
}
