use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PREFS_SCHEMA_VERSION: u32 = 1;
const PREFS_FILE_NAME: &str = "preferences.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported preferences version {found} (expected 1)")]
    UnsupportedVersion { found: u32 },
    #[error("invalid zoom {0}: must be a positive number")]
    InvalidZoom(f32),
}

/// User-adjustable settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Pixels per page unit when rasterizing pages for display.
    pub zoom: f32,
    pub tesseract_command: String,
    pub ocr_language: String,
    pub debug_logging: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            zoom: 2.0,
            tesseract_command: "tesseract".to_owned(),
            ocr_language: "eng".to_owned(),
            debug_logging: false,
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            Ok(())
        } else {
            Err(StorageError::InvalidZoom(self.zoom))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Bubblemark", "Bubblemark")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        load_preferences_from(&self.preferences_path())
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        preferences.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        Ok(())
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFS_FILE_NAME)
    }
}

/// Reads a preferences file, falling back to defaults when it does not exist.
pub fn load_preferences_from(path: &Path) -> Result<Preferences, StorageError> {
    if !path.exists() {
        debug!(path = %path.display(), "no preferences file, using defaults");
        return Ok(Preferences::default());
    }

    let bytes = fs::read(path)?;
    let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version != PREFS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion { found: envelope.version });
    }
    envelope.preferences.validate()?;

    Ok(envelope.preferences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("nested"));

        let prefs = Preferences {
            zoom: 3.0,
            tesseract_command: "/opt/tesseract/bin/tesseract".to_owned(),
            ocr_language: "deu".to_owned(),
            debug_logging: true,
        };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, Preferences::default());
        assert_eq!(loaded.zoom, 2.0);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("prefs.json");
        fs::write(&path, r#"{"version":1,"preferences":{"ocr_language":"fra"}}"#).expect("seed");

        let loaded = load_preferences_from(&path).expect("load should succeed");
        assert_eq!(loaded.ocr_language, "fra");
        assert_eq!(loaded.tesseract_command, "tesseract");
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("prefs.json");
        fs::write(&path, r#"{"version":7,"preferences":{}}"#).expect("seed");

        let err = load_preferences_from(&path).expect_err("should reject");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 7 }));
    }

    #[test]
    fn non_positive_zoom_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let prefs = Preferences { zoom: 0.0, ..Preferences::default() };

        assert!(matches!(store.save_preferences(&prefs), Err(StorageError::InvalidZoom(_))));
        assert!(!store.preferences_path().exists());
    }
}
