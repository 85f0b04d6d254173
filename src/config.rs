//! Picker configuration at ~/.config/locus/config.toml.
//!
//! Every field has a default; a missing file means "all defaults" and a
//! broken file is reported and ignored.

use crate::location::acquisition::{DEFAULT_DESIRED_ACCURACY_M, DEFAULT_MAX_WAIT};
use crate::location::providers::{DEFAULT_BASE_URL, DEFAULT_LANGUAGE, DEFAULT_USER_AGENT};
use crate::location::types::DEFAULT_RADIUS_M;
use crate::location::NominatimClient;
use crate::picker::PickerSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PickerConfig {
    pub geocoder: GeocoderConfig,
    pub acquisition: AcquisitionConfig,
    pub selection: SelectionConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Sent as `accept-language`.
    pub language: String,
    pub user_agent: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub desired_accuracy_m: f64,
    pub max_wait_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    pub radius_m: f64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            desired_accuracy_m: DEFAULT_DESIRED_ACCURACY_M,
            max_wait_ms: DEFAULT_MAX_WAIT.as_millis() as u64,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { radius_m: DEFAULT_RADIUS_M }
    }
}

impl PickerConfig {
    /// Load from the default location.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Self::default()
            }
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("locus")
            .join("config.toml")
    }

    pub fn picker_settings(&self) -> PickerSettings {
        PickerSettings {
            desired_accuracy_m: self.acquisition.desired_accuracy_m,
            max_wait: Duration::from_millis(self.acquisition.max_wait_ms),
            radius_m: self.selection.radius_m,
        }
    }

    pub fn geocoder(&self) -> NominatimClient {
        NominatimClient::new(&self.geocoder.base_url, &self.geocoder.language, &self.geocoder.user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PickerConfig::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config, PickerConfig::default());
        let settings = config.picker_settings();
        assert_eq!(settings.desired_accuracy_m, 50.0);
        assert_eq!(settings.max_wait, Duration::from_secs(10));
        assert_eq!(settings.radius_m, 500.0);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[geocoder]
language = "en"

[acquisition]
max_wait_ms = 4000
"#,
        )
        .unwrap();

        let config = PickerConfig::load_from(&path);
        assert_eq!(config.geocoder.language, "en");
        assert_eq!(config.geocoder.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.acquisition.max_wait_ms, 4000);
        assert_eq!(config.acquisition.desired_accuracy_m, 50.0);
        assert_eq!(config.selection.radius_m, 500.0);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[acquisition\nmax_wait_ms = ").unwrap();
        assert_eq!(PickerConfig::load_from(&path), PickerConfig::default());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let mut config = PickerConfig::default();
        config.selection.radius_m = 1200.0;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: PickerConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
