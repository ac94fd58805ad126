//! Cross-platform path utilities for the fluency workspace.
//!
//! Single source of truth for where the assessment database and the
//! configuration file live.
//!
//! # Platform Behavior
//!
//! | Platform | Data Directory | Config Directory |
//! |----------|----------------|------------------|
//! | Linux    | `~/.local/share/fluency` | `~/.config/fluency` |
//! | macOS    | `~/Library/Application Support/fluency` | Same as data dir |
//! | Windows  | `%APPDATA%/fluency` | Same as data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

/// Application identifier used in path construction.
const APP_NAME: &str = "fluency";

/// SQLite file holding attempts, assessments and insights.
const DATABASE_FILE_NAME: &str = "assessments.db";

/// TOML configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Create `dir` (and parents) if missing, owner-only on Unix.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Get the application data directory, creating it if needed.
///
/// # Errors
/// Returns an error if the directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().ok_or(PathError::NoDataDirectory)?;
    let data_dir = base_dir.join(APP_NAME);
    ensure_private_dir(&data_dir)?;
    Ok(data_dir)
}

/// Get the configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/fluency`
/// - **macOS / Windows**: config lives with data
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
        let config_dir = config_base.join(APP_NAME);
        ensure_private_dir(&config_dir)?;
        Ok(config_dir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Get the database directory (`<data_dir>/db`).
pub fn get_db_dir() -> Result<PathBuf> {
    let db_dir = get_data_dir()?.join("db");
    ensure_private_dir(&db_dir)?;
    Ok(db_dir)
}

/// Default location of the assessment database.
pub fn default_database_path() -> Result<PathBuf> {
    Ok(get_db_dir()?.join(DATABASE_FILE_NAME))
}

/// Default location of the TOML configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` against the home directory.
///
/// Paths without a tilde are returned unchanged.
pub fn expand_home<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };

    let home = dirs::home_dir().ok_or(PathError::NoHomeDirectory)?;
    Ok(home.join(rest))
}
