//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::target::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.port == 0 {
        return Err(MigrateError::Config("target.port must be non-zero".into()));
    }
    if !is_plain_identifier(&config.target.schema) {
        return Err(MigrateError::Config(format!(
            "target.schema must be a plain identifier (letters, digits, underscore), got '{}'",
            config.target.schema
        )));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    if config.migration.default_radius_meters == 0 {
        return Err(MigrateError::Config(
            "migration.default_radius_meters must be at least 1".into(),
        ));
    }

    Ok(())
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                path: PathBuf::from("app_data.json"),
            },
            target: TargetConfig {
                host: "127.0.0.1".to_string(),
                port: 5433,
                database: "oshen_alerts".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 10,
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = PathBuf::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_schema_must_be_identifier() {
        let mut config = valid_config();
        config.target.schema = "public; DROP TABLE vessels".to_string();
        assert!(validate(&config).is_err());

        config.target.schema = "9lives".to_string();
        assert!(validate(&config).is_err());

        config.target.schema = "fleet_ops".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_radius_rejected() {
        let mut config = valid_config();
        config.migration.default_radius_meters = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_serialized_config_omits_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("super_secret_password_456"));
        assert!(!yaml.contains("password"));
        assert!(yaml.contains("oshen_alerts"));
    }
}
