//! Configuration validation

use crate::schema::{RawConfig, RawDriver};
use hos_api::CycleDays;
use std::collections::HashSet;
use thiserror::Error;

/// Upper bound on per-client request rate
pub const MAX_RATE_LIMIT_PER_SECOND: u32 = 10_000;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Driver '{driver_id}': {message}")]
    DriverError { driver_id: String, message: String },

    #[error("Duplicate driver ID: {0}")]
    DuplicateDriverId(String),

    #[error("Invalid cycle '{0}': expected \"60h/7d\" or \"70h/8d\"")]
    InvalidCycle(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(cycle) = &config.service.default_cycle {
        if parse_cycle(cycle).is_err() {
            errors.push(ValidationError::InvalidCycle(cycle.clone()));
        }
    }

    if let Some(rate) = config.service.rate_limit_per_second {
        if rate == 0 || rate > MAX_RATE_LIMIT_PER_SECOND {
            errors.push(ValidationError::GlobalError(format!(
                "rate_limit_per_second must be between 1 and {}",
                MAX_RATE_LIMIT_PER_SECOND
            )));
        }
    }

    if let Some(path) = &config.service.socket_path {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::GlobalError(
                "socket_path cannot be empty".into(),
            ));
        }
    }

    let mut seen_ids = HashSet::new();
    for driver in &config.drivers {
        if !seen_ids.insert(driver.id.as_str()) {
            errors.push(ValidationError::DuplicateDriverId(driver.id.clone()));
        }
    }

    for driver in &config.drivers {
        errors.extend(validate_driver(driver));
    }

    errors
}

fn validate_driver(driver: &RawDriver) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if driver.id.trim().is_empty() {
        errors.push(ValidationError::DriverError {
            driver_id: driver.id.clone(),
            message: "id cannot be empty".into(),
        });
    }

    if let Some(cycle) = &driver.cycle {
        if parse_cycle(cycle).is_err() {
            errors.push(ValidationError::DriverError {
                driver_id: driver.id.clone(),
                message: format!("invalid cycle '{}'", cycle),
            });
        }
    }

    errors
}

/// Parse a cycle rule ("60h/7d", "70h/8d", "7", "8")
pub fn parse_cycle(s: &str) -> Result<CycleDays, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawServiceConfig;

    fn config_with_drivers(drivers: Vec<RawDriver>) -> RawConfig {
        RawConfig {
            config_version: 1,
            service: RawServiceConfig::default(),
            drivers,
        }
    }

    #[test]
    fn test_parse_cycle() {
        assert_eq!(parse_cycle("60h/7d").unwrap(), CycleDays::Seven);
        assert_eq!(parse_cycle("70h/8d").unwrap(), CycleDays::Eight);
        assert_eq!(parse_cycle("8").unwrap(), CycleDays::Eight);
        assert!(parse_cycle("80h/9d").is_err());
    }

    #[test]
    fn test_duplicate_id_detection() {
        let config = config_with_drivers(vec![
            RawDriver {
                id: "drv-001".into(),
                cycle: None,
            },
            RawDriver {
                id: "drv-001".into(),
                cycle: Some("60h/7d".into()),
            },
        ]);

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateDriverId(_))));
    }

    #[test]
    fn test_bad_driver_cycle() {
        let config = config_with_drivers(vec![RawDriver {
            id: "drv-002".into(),
            cycle: Some("weekly".into()),
        }]);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::DriverError { driver_id, .. } if driver_id == "drv-002"
        ));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = config_with_drivers(vec![RawDriver {
            id: " ".into(),
            cycle: None,
        }]);
        config.service.default_cycle = Some("forever".into());
        config.service.rate_limit_per_second = Some(0);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
    }
}
