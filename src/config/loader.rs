//! Layered configuration loading
//!
//! Sources, lowest priority first: built-in defaults, a TOML file, then the
//! process environment. The merged result is validated before use.

use crate::{Error, Result, config::Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name looked up in the user configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolves and merges configuration sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    search_default: bool,
}

impl ConfigLoader {
    /// Loader that falls back to `<config dir>/gramweb/config.toml`
    pub fn new() -> Self {
        Self {
            search_default: true,
        }
    }

    /// Loader that only reads the file it is given
    pub fn explicit_only() -> Self {
        Self {
            search_default: false,
        }
    }

    /// Per-user configuration file location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gramweb").join(CONFIG_FILE_NAME))
    }

    /// Merge defaults, file and environment, then validate
    ///
    /// An explicitly named file must exist. The default location is only
    /// read when present.
    pub fn load(&self, config_file: Option<&Path>) -> Result<Settings> {
        let file = match config_file {
            Some(path) if !path.exists() => {
                return Err(Error::config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None if self.search_default => Self::default_path().filter(|p| p.exists()),
            None => None,
        };

        let settings = match &file {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Settings::from_file(path)?
            }
            None => Settings::default(),
        };

        let settings = settings.merge_with_env()?;
        settings.validate()?;
        debug!("Effective configuration: {:?}", settings);
        Ok(settings)
    }
}
