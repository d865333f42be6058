//! Application configuration, stored as `config.json` next to the executable.

use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::Result;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_BACKUP_SUFFIX: &str = "json.backup";
pub const PLAYLISTS_DIR_NAME: &str = "playlists";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub music_root: Option<PathBuf>,
}

impl AppConfig {
    /// Loads the config from `path`. A missing file gives the defaults; a
    /// corrupt one is copied aside to `config.json.backup` and also gives the
    /// defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(crate::LibraryError::from)
            .and_then(|text| serde_json::from_str::<AppConfig>(&text).map_err(Into::into));

        match parsed {
            Ok(config) => config,
            Err(err) => {
                warn!("Could not load config file {}: {}", path.display(), err);
                let backup = path.with_extension(CONFIG_BACKUP_SUFFIX);
                match fs::copy(path, &backup) {
                    Ok(_) => info!("Backed up corrupted config to: {}", backup.display()),
                    Err(err) => warn!("Could not back up corrupted config: {}", err),
                }
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Directory that holds `config.json` and saved playlists.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub app_dir: PathBuf,
}

impl AppDirs {
    /// Uses `override_dir` when given, otherwise the directory of the running
    /// executable.
    pub fn resolve(override_dir: Option<PathBuf>) -> Result<Self> {
        let app_dir = match override_dir {
            Some(dir) => dir,
            None => {
                let exe = std::env::current_exe()?;
                exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
            }
        };
        Ok(Self { app_dir })
    }

    pub fn config_path(&self) -> PathBuf {
        self.app_dir.join(CONFIG_FILE_NAME)
    }

    /// Saved playlist directory, created on first use.
    pub fn playlists_dir(&self) -> Result<PathBuf> {
        let dir = self.app_dir.join(PLAYLISTS_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
