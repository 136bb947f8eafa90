//! Default paths for curfew components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/curfewd/curfewd.sock` or `/tmp/curfewd-$USER/curfewd.sock`
//! - Config: `$XDG_CONFIG_HOME/curfew/config.toml` or `~/.config/curfew/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const CURFEW_CONFIG_ENV: &str = "CURFEW_CONFIG";

/// Socket filename within the socket directory
const SOCKET_FILENAME: &str = "curfewd.sock";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Runtime subdirectory name
const DAEMON_DIR: &str = "curfewd";

/// Config subdirectory name
const CONFIG_DIR: &str = "curfew";

/// Get the default socket path.
///
/// `$XDG_RUNTIME_DIR/curfewd/curfewd.sock`, or `/tmp/curfewd-$USER/curfewd.sock`
/// without a runtime dir. The `CURFEW_SOCKET` override is handled by clap.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(DAEMON_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", DAEMON_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$CURFEW_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/curfew/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/curfew/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CURFEW_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking the CURFEW_CONFIG env var.
pub fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(CONFIG_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILENAME);
    }

    // Last resort
    PathBuf::from("/etc").join(CONFIG_DIR).join(CONFIG_FILENAME)
}
