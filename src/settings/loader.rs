//! Settings loading and hot-reloading.
//!
//! Settings are read from a single JSON file. The streaming loop asks a
//! [`ConfigurationSource`] for the current settings once per tick, so a source
//! that re-reads its file gives hot-reload for free: the engine notices the
//! changed values and resets the loader pool.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use log::{info, warn};

use super::TerrainSettings;
use crate::error::TerrainError;

/// Supplies terrain settings to the streaming loop.
///
/// Called once per tick. Implementations should be cheap when nothing changed.
pub trait ConfigurationSource {
    /// Returns the settings that should be in effect for this tick.
    fn current_settings(&mut self) -> TerrainSettings;
}

/// A configuration source whose settings never change.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticConfiguration(pub TerrainSettings);

impl ConfigurationSource for StaticConfiguration {
    fn current_settings(&mut self) -> TerrainSettings {
        self.0
    }
}

/// Load and validate settings from a JSON file.
///
/// # Arguments
/// * `path` - Path of the JSON settings file
///
/// # Errors
/// - [`TerrainError::SettingsIo`] if the file cannot be read
/// - [`TerrainError::SettingsParse`] if it is not valid settings JSON
/// - any configuration error reported by [`TerrainSettings::validate`]
pub fn load_settings_from_file(path: impl AsRef<Path>) -> Result<TerrainSettings, TerrainError> {
    let contents = fs::read_to_string(path.as_ref())?;
    let settings: TerrainSettings = serde_json::from_str(&contents)?;
    settings.validate()?;
    Ok(settings)
}

/// A configuration source backed by a JSON file that is re-read whenever its
/// modification time changes.
///
/// If a rewritten file fails to load, the last good settings stay in effect and
/// a warning is logged.
pub struct JsonFileConfiguration {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    settings: TerrainSettings,
}

impl JsonFileConfiguration {
    /// Open a settings file.
    ///
    /// # Errors
    /// Fails if the initial load fails; there is no previous configuration to
    /// fall back to yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TerrainError> {
        let path = path.into();
        let settings = load_settings_from_file(&path)?;
        let last_modified = Self::modified(&path);
        info!("Loaded terrain settings from {}", path.display());
        Ok(Self {
            path,
            last_modified,
            settings,
        })
    }

    fn modified(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|meta| meta.modified()).ok()
    }
}

impl ConfigurationSource for JsonFileConfiguration {
    fn current_settings(&mut self) -> TerrainSettings {
        let modified = Self::modified(&self.path);
        if modified.is_some() && modified != self.last_modified {
            self.last_modified = modified;
            match load_settings_from_file(&self.path) {
                Ok(settings) => {
                    info!("Settings file {} changed, reloading", self.path.display());
                    self.settings = settings;
                }
                Err(err) => {
                    warn!(
                        "Ignoring changed settings file {}: {}",
                        self.path.display(),
                        err
                    );
                }
            }
        }
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(file: &mut tempfile::NamedTempFile, json: &str) {
        let handle = file.as_file_mut();
        handle.set_len(0).unwrap();
        std::io::Seek::rewind(handle).unwrap();
        handle.write_all(json.as_bytes()).unwrap();
        handle.sync_all().unwrap();
    }

    #[test]
    fn loads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_settings(&mut file, r#"{ "terrain": { "sampling_width": 8 } }"#);
        let settings = load_settings_from_file(file.path()).unwrap();
        assert_eq!(settings.terrain.sampling_width, 8);

        write_settings(&mut file, r#"{ "terrain": { "sampling_width": 0 } }"#);
        let err = load_settings_from_file(file.path()).unwrap_err();
        assert!(matches!(err, TerrainError::ZeroSizeVolume { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_settings_from_file("/definitely/not/here/terrain.json").unwrap_err();
        assert!(matches!(err, TerrainError::SettingsIo(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_settings(&mut file, "{ not json");
        let err = load_settings_from_file(file.path()).unwrap_err();
        assert!(matches!(err, TerrainError::SettingsParse(_)));
    }

    #[test]
    fn file_source_keeps_last_good_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_settings(&mut file, r#"{ "streaming": { "render_distance": 3 } }"#);
        let mut source = JsonFileConfiguration::open(file.path()).unwrap();
        assert_eq!(source.current_settings().streaming.render_distance, 3);

        write_settings(&mut file, "{ broken");
        // Force a reload regardless of the filesystem's timestamp resolution.
        source.last_modified = None;
        assert_eq!(source.current_settings().streaming.render_distance, 3);

        write_settings(&mut file, r#"{ "streaming": { "render_distance": 5 } }"#);
        source.last_modified = None;
        assert_eq!(source.current_settings().streaming.render_distance, 5);
    }
}
