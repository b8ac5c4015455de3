use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Algorithm;
use crate::utils::warn_println;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// In-memory settings, owned by the interceptor for its whole lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub algorithm: Algorithm,
    pub quality: u8,
    pub bytes_saved: i64,
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Compress,
            quality: 50,
            bytes_saved: 0,
            enabled: true,
        }
    }
}

/// Settings record as found on disk. Every field is optional; missing ones
/// fall back to [`Settings::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    #[serde(alias = "algo")]
    pub algorithm: Option<Algorithm>,
    pub quality: Option<i64>,
    /// Integer or float; older records stored the total as a float
    pub bytes_saved: Option<Number>,
    pub enabled: Option<bool>,
}

impl Settings {
    /// Merge a persisted record over the defaults
    pub fn merged(persisted: Option<PersistedSettings>) -> Self {
        let mut settings = Settings::default();
        let Some(persisted) = persisted else {
            return settings;
        };

        if let Some(algorithm) = persisted.algorithm {
            settings.algorithm = algorithm;
        }

        if let Some(quality) = persisted.quality {
            let clamped = quality.clamp(MIN_QUALITY as i64, MAX_QUALITY as i64);
            if clamped != quality {
                warn_println(&format!(
                    "Stored quality {} is out of range, using {}",
                    quality, clamped
                ));
            }
            settings.quality = clamped as u8;
        }

        if let Some(bytes_saved) = persisted.bytes_saved {
            match byte_count(&bytes_saved) {
                Some(count) => settings.bytes_saved = count,
                None => warn_println(&format!(
                    "Stored bytesSaved {} does not fit a byte count, starting from 0",
                    bytes_saved
                )),
            }
        }

        if let Some(enabled) = persisted.enabled {
            settings.enabled = enabled;
        }

        settings
    }
}

/// Whole byte count for a stored total. Floats are rounded; values outside the
/// `i64` range (or not finite) are rejected.
fn byte_count(value: &Number) -> Option<i64> {
    if let Some(count) = value.as_i64() {
        return Some(count);
    }

    // i64::MAX is not representable as f64; 2^63 is the first value past it
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let rounded = value.as_f64()?.round();
    if rounded.is_finite() && rounded >= -LIMIT && rounded < LIMIT {
        Some(rounded as i64)
    } else {
        None
    }
}

/// Loads and saves the settings record
pub trait SettingsStore {
    /// `None` when nothing has been persisted yet
    fn load(&self) -> Result<Option<PersistedSettings>>;
    fn save(&mut self, settings: &Settings) -> Result<()>;
}

/// Settings persisted as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Option<PersistedSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {:?}", self.path))?;

        if contents.trim().is_empty() {
            return Ok(None);
        }

        let persisted: PersistedSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {:?}", self.path))?;

        Ok(Some(persisted))
    }

    fn save(&mut self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory: {:?}", parent)
                })?;
            }
        }

        let json =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings file: {:?}", self.path))?;
        Ok(())
    }
}
