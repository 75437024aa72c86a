//! Configuration (§6): one feature flag (`multidata_ingestion_enabled`)
//! and the detector's tunable defaults, both loadable from an optional
//! TOML file with struct defaults when absent — the same `config` +
//! `toml` combination the rest of this workspace uses for settings.

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::detector::DetectorParams;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default)]
    pub multidata_ingestion_enabled: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            multidata_ingestion_enabled: false,
        }
    }
}

impl IngestionConfig {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().set_default("multidata_ingestion_enabled", false)?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder.build()?.try_deserialize()
    }
}

/// Detector tunables, loaded the same way. Converted into a `DetectorParams`
/// bundle with `into_params`.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorSettings {
    pub min_back_window: u32,
    pub max_back_window: u32,
    pub fore_window: u32,
    pub magnitude_threshold: f64,
    pub confidence_threshold: f64,
    pub mag_check: bool,
    pub above_threshold_is_anomaly: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        let defaults = DetectorParams::student_defaults();
        DetectorSettings {
            min_back_window: defaults.min_back_window,
            max_back_window: defaults.max_back_window,
            fore_window: defaults.fore_window,
            magnitude_threshold: defaults.magnitude_threshold,
            confidence_threshold: defaults.confidence_threshold,
            mag_check: defaults.mag_check,
            above_threshold_is_anomaly: defaults.above_threshold_is_anomaly,
        }
    }
}

impl DetectorSettings {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = DetectorSettings::default();
        let mut builder = Config::builder()
            .set_default("min_back_window", defaults.min_back_window)?
            .set_default("max_back_window", defaults.max_back_window)?
            .set_default("fore_window", defaults.fore_window)?
            .set_default("magnitude_threshold", defaults.magnitude_threshold)?
            .set_default("confidence_threshold", defaults.confidence_threshold)?
            .set_default("mag_check", defaults.mag_check)?
            .set_default(
                "above_threshold_is_anomaly",
                defaults.above_threshold_is_anomaly,
            )?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder.build()?.try_deserialize()
    }

    pub fn into_params(self, name: &str) -> DetectorParams {
        DetectorParams {
            name: name.to_string(),
            min_back_window: self.min_back_window,
            max_back_window: self.max_back_window,
            fore_window: self.fore_window,
            magnitude_threshold: self.magnitude_threshold,
            confidence_threshold: self.confidence_threshold,
            mag_check: self.mag_check,
            above_threshold_is_anomaly: self.above_threshold_is_anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_config_defaults_to_disabled() {
        let config = IngestionConfig::load(None).unwrap();
        assert!(!config.multidata_ingestion_enabled);
    }

    #[test]
    fn detector_settings_default_matches_student_defaults() {
        let settings = DetectorSettings::load(None).unwrap();
        let params = settings.into_params("student");
        let defaults = DetectorParams::student_defaults();
        assert_eq!(params.min_back_window, defaults.min_back_window);
        assert_eq!(params.confidence_threshold, defaults.confidence_threshold);
    }
}
