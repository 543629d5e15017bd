//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Per-driver overrides
    #[serde(default)]
    pub drivers: Vec<RawDriver>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/hosd/hosd.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the ledger database
    pub data_dir: Option<PathBuf>,

    /// Cycle rule for drivers without an override: "60h/7d" or "70h/8d"
    pub default_cycle: Option<String>,

    /// Requests per second allowed for each IPC client
    pub rate_limit_per_second: Option<u32>,
}

/// Per-driver settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawDriver {
    pub id: String,

    /// Cycle rule used when the driver's ledger is first created
    pub cycle: Option<String>,
}
