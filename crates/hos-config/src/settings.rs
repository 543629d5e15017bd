//! Validated settings

use crate::schema::{RawConfig, RawServiceConfig};
use crate::validation::parse_cycle;
use hos_api::CycleDays;
use hos_util::{DriverId, default_data_dir, default_socket_path};
use std::collections::HashMap;
use std::path::PathBuf;

/// Requests per second per IPC client when not configured
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 30;

/// Validated settings ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub service: ServiceConfig,

    /// Cycle rule for drivers without an override
    pub default_cycle: CycleDays,

    /// Per-driver cycle overrides
    pub driver_cycles: HashMap<DriverId, CycleDays>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let default_cycle = raw
            .service
            .default_cycle
            .as_deref()
            .and_then(|c| parse_cycle(c).ok())
            .unwrap_or_default();

        let driver_cycles = raw
            .drivers
            .iter()
            .filter_map(|d| {
                let cycle = parse_cycle(d.cycle.as_deref()?).ok()?;
                Some((DriverId::new(d.id.trim()), cycle))
            })
            .collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            default_cycle,
            driver_cycles,
        }
    }

    /// Cycle rule a new ledger for `driver_id` starts with
    pub fn cycle_for(&self, driver_id: &DriverId) -> CycleDays {
        self.driver_cycles
            .get(driver_id)
            .copied()
            .unwrap_or(self.default_cycle)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub rate_limit_per_second: u32,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            rate_limit_per_second: raw
                .rate_limit_per_second
                .unwrap_or(DEFAULT_RATE_LIMIT_PER_SECOND),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            data_dir: default_data_dir(),
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
        }
    }
}
