use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use viewer_core::MatchSettings;

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported settings version {0}")]
    UnsupportedVersion(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: MatchSettings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "ButterPaper", "ButterPaper")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Stored match settings, or defaults when nothing has been saved yet.
    pub fn load_settings(&self) -> Result<MatchSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            debug!(path = %path.display(), "no stored settings, using defaults");
            return Ok(MatchSettings::default());
        }

        read_settings_file(&path)
    }

    pub fn save_settings(&self, settings: &MatchSettings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }
}

/// Reads settings from `path`, accepting either the stored envelope or a bare settings object.
pub fn read_settings_file(path: &Path) -> Result<MatchSettings, StorageError> {
    let bytes = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;

    if value.get("version").is_none() {
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: SettingsEnvelope = serde_json::from_value(value)?;
    if envelope.version != SETTINGS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(envelope.version));
    }

    Ok(envelope.settings)
}
