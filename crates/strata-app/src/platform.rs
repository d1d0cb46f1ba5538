//! Per-user directories for the runner.
//!
//! Config and logs resolve to OS conventions (XDG on Linux, Known Folders on
//! Windows, Library on macOS) unless the command line names a config directory.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DirsError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("failed to create directory: {0}")]
    Io(#[from] io::Error),
}

const APP_NAME: &str = "strata";

pub struct StrataDirs {
    /// Holds `strata.ron`.
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl StrataDirs {
    /// Resolve directories without creating them. `config_override` replaces the
    /// OS config location; logs then go next to it.
    pub fn resolve(config_override: Option<&Path>) -> Result<Self, DirsError> {
        match config_override {
            Some(dir) => Ok(Self::resolve_with_root(dir)),
            None => {
                let base = dirs::config_dir().ok_or(DirsError::NoConfigDir)?;
                Ok(Self::resolve_with_root(&base.join(APP_NAME)))
            }
        }
    }

    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join("logs"),
        }
    }

    pub fn create_dirs(&self) -> Result<(), DirsError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}
