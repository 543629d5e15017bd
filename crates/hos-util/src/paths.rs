//! Default paths for hosd components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/hosd/hosd.sock` or `/tmp/hosd-$USER/hosd.sock`
//! - Data: `$XDG_DATA_HOME/hosd` or `~/.local/share/hosd`
//! - Config: `$XDG_CONFIG_HOME/hosd/config.toml` or `~/.config/hosd/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const HOS_SOCKET_ENV: &str = "HOS_SOCKET";

/// Environment variable for overriding the data directory
pub const HOS_DATA_DIR_ENV: &str = "HOS_DATA_DIR";

const SOCKET_FILENAME: &str = "hosd.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "hosd";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$HOS_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/hosd/hosd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/hosd-$USER/hosd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(HOS_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the HOS_SOCKET env var.
/// Used for config defaults where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$HOS_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/hosd` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/hosd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(HOS_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the HOS_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}
