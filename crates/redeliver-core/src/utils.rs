//! Shared utility functions

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Get the user's home directory
///
/// Prefers the HOME environment variable over `dirs::home_dir()` so that
/// containers which remap HOME resolve the same config directory as the shell.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| Error::invalid_config("Could not determine home directory"))
}
