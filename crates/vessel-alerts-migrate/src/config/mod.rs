//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
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
}

impl TargetConfig {
    /// Human-readable location used in logs and error context (no credentials).
    pub fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    /// Build a tokio-postgres connection config.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        if !self.password.is_empty() {
            pg_config.password(&self.password);
        }
        pg_config.application_name("vessel-alerts-migrate");
        pg_config.connect_timeout(std::time::Duration::from_secs(self.connect_timeout_secs));
        pg_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  path: app_data.json
target:
  host: 127.0.0.1
  database: oshen_alerts
  user: postgres
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.path, Path::new("app_data.json"));
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.target.password, "");
        assert!(!config.migration.init_schema);
        assert_eq!(config.migration.default_radius_meters, 1000);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
source:
  path: /data/app_data.json
target:
  host: db.internal
  port: 5433
  database: alerts
  user: migrator
  password: hunter2
  schema: fleet
  ssl_mode: require
  connect_timeout_secs: 3
migration:
  init_schema: true
  default_radius_meters: 500
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.target.port, 5433);
        assert_eq!(config.target.schema, "fleet");
        assert_eq!(config.target.describe(), "db.internal:5433/alerts");
        assert!(config.migration.init_schema);
        assert_eq!(config.migration.default_radius_meters, 500);
    }

    #[test]
    fn test_missing_target_section_is_yaml_error() {
        let err = Config::from_yaml("source:\n  path: a.json\n").unwrap_err();
        assert!(matches!(err, crate::MigrateError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("definitely-not-here.yaml").unwrap_err();
        assert!(matches!(err, crate::MigrateError::Io(_)));
    }
}
