//! Configuration-directory resolution
//!
//! Resolves where settings and the resume snapshot live, with the usual
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent default

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve the data directory for player state files.
pub fn resolve_data_dir(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: OS-dependent default
    default_data_dir()
}

/// OS-dependent default data directory
fn default_data_dir() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("jbx"))
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
    } else if cfg!(any(target_os = "macos", target_os = "windows")) {
        dirs::data_dir()
            .map(|d| d.join("jbx"))
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
    } else {
        Ok(PathBuf::from("./jbx_data"))
    }
}

/// Path of the TOML settings file inside a data directory.
pub fn settings_file(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("player.toml")
}

/// Path of the resume snapshot inside a data directory.
///
/// A hidden dotfile next to the settings, written with plain `key=value`
/// lines so it survives a hard kill during shutdown.
pub fn resume_file(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(".player-resume")
}
