//! Configuration parsing and validation for hosd
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Service settings (socket, data directory, rate limit)
//! - Default and per-driver cycle rules
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let settings = parse_config(&content)?;
    tracing::debug!(path = %path.display(), drivers = settings.driver_cycles.len(), "Configuration loaded");
    Ok(settings)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use hos_api::CycleDays;
    use hos_util::DriverId;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();

        assert_eq!(settings.default_cycle, CycleDays::Eight);
        assert!(settings.driver_cycles.is_empty());
        assert_eq!(
            settings.service.rate_limit_per_second,
            DEFAULT_RATE_LIMIT_PER_SECOND
        );
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [service]
            socket_path = "/tmp/hosd-test.sock"
            data_dir = "/tmp/hosd-data"
            default_cycle = "60h/7d"
            rate_limit_per_second = 5

            [[drivers]]
            id = "drv-001"
            cycle = "70h/8d"

            [[drivers]]
            id = "drv-002"
        "#;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.service.socket_path, PathBuf::from("/tmp/hosd-test.sock"));
        assert_eq!(settings.service.data_dir, PathBuf::from("/tmp/hosd-data"));
        assert_eq!(settings.service.rate_limit_per_second, 5);
        assert_eq!(settings.default_cycle, CycleDays::Seven);

        assert_eq!(settings.cycle_for(&DriverId::new("drv-001")), CycleDays::Eight);
        assert_eq!(settings.cycle_for(&DriverId::new("drv-002")), CycleDays::Seven);
        assert_eq!(settings.cycle_for(&DriverId::new("unknown")), CycleDays::Seven);
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_cycle() {
        let config = r#"
            config_version = 1

            [service]
            default_cycle = "80h/9d"
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert!(matches!(errors[0], ValidationError::InvalidCycle(_)));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1").unwrap();
        writeln!(file, "[service]").unwrap();
        writeln!(file, "default_cycle = \"60h/7d\"").unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.default_cycle, CycleDays::Seven);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
