pub mod cli;
pub mod toml_config;

use crate::core::reward::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::core::classification::DEFAULT_POINTS_SCALE;
use crate::domain::model::{CaptureMethod, PositionOptions};
use crate::domain::ports::{ConfigProvider, ZoneSource};
use crate::utils::error::{Result, XpError};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate, IMAGE_EXTENSIONS,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "recycle-xp")]
#[command(about = "Verify a recycling photo at a registered zone and earn XP")]
pub struct CliConfig {
    #[arg(long, help = "Photo of the recyclable item")]
    pub image: String,

    #[arg(long, default_value = "gps", help = "gps (location-verified) or gallery (demo only)")]
    pub method: CaptureMethod,

    #[arg(long, help = "Feed the image through the live capture surface instead of as a file")]
    pub camera: bool,

    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    #[arg(long, default_value = "10")]
    pub accuracy: f64,

    #[arg(long, default_value = "zones.csv")]
    pub zones_file: String,

    #[arg(long)]
    pub zones_endpoint: Option<String>,

    #[arg(long, default_value = "http://localhost:9001/classify")]
    pub classifier_endpoint: String,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long, default_value = "30")]
    pub classifier_timeout: u64,

    #[arg(long, default_value = "10000")]
    pub timeout_ms: u64,

    #[arg(long, default_value = "0")]
    pub max_cache_age_ms: u64,

    #[arg(long, help = "Do not request a high-accuracy fix")]
    pub low_accuracy: bool,

    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    pub confidence_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_POINTS_SCALE)]
    pub points_scale: f64,

    #[arg(long, default_value = "./xp-ledger.json")]
    pub ledger_path: String,

    #[arg(long)]
    pub record_endpoint: Option<String>,

    #[arg(long, default_value = "local-user")]
    pub user_id: String,

    #[arg(long, help = "Confirm an eligible result and credit the XP")]
    pub confirm: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn classifier_endpoint(&self) -> &str {
        &self.classifier_endpoint
    }

    fn classifier_api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn classifier_timeout_seconds(&self) -> u64 {
        self.classifier_timeout
    }

    fn zone_source(&self) -> ZoneSource {
        match &self.zones_endpoint {
            Some(endpoint) => ZoneSource::Endpoint(endpoint.clone()),
            None => ZoneSource::CsvFile(self.zones_file.clone()),
        }
    }

    fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: !self.low_accuracy,
            timeout_ms: self.timeout_ms,
            max_cache_age_ms: self.max_cache_age_ms,
        }
    }

    fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    fn points_scale(&self) -> f64 {
        self.points_scale
    }

    fn ledger_path(&self) -> &str {
        &self.ledger_path
    }

    fn record_endpoint(&self) -> Option<&str> {
        self.record_endpoint.as_deref()
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Checks shared by every `ConfigProvider`.
pub fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_url("classifier_endpoint", config.classifier_endpoint())?;
    validate_positive_number("classifier_timeout", config.classifier_timeout_seconds(), 1)?;

    match config.zone_source() {
        ZoneSource::Endpoint(endpoint) => validate_url("zones_endpoint", &endpoint)?,
        ZoneSource::CsvFile(path) => validate_path("zones_file", &path)?,
    }

    let options = config.position_options();
    validate_positive_number("timeout_ms", options.timeout_ms, 1)?;

    validate_range("confidence_threshold", config.confidence_threshold(), 0.0, 1.0)?;
    validate_range("points_scale", config.points_scale(), 0.0, 1_000.0)?;
    validate_path("ledger_path", config.ledger_path())?;
    validate_non_empty_string("user_id", config.user_id())?;

    if let Some(endpoint) = config.record_endpoint() {
        validate_url("record_endpoint", endpoint)?;
    }
    Ok(())
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("image", &self.image)?;
        validate_file_extension("image", &self.image, IMAGE_EXTENSIONS)?;
        validate_provider(self)?;

        if self.lat.is_some() != self.lon.is_some() {
            return Err(XpError::ConfigValidationError {
                field: "lat/lon".to_string(),
                message: "latitude and longitude must be given together".to_string(),
            });
        }
        if self.accuracy.is_nan() || self.accuracy < 0.0 {
            return Err(XpError::InvalidConfigValueError {
                field: "accuracy".to_string(),
                value: self.accuracy.to_string(),
                reason: "Accuracy must be a non-negative number of meters".to_string(),
            });
        }

        tracing::debug!("✅ CLI configuration validation passed");
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["recycle-xp", "--image", "bottle.jpg"];
        argv.extend_from_slice(args);
        CliConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.method, CaptureMethod::Gps);
        assert_eq!(config.position_options(), PositionOptions::default());
        assert_eq!(config.zone_source(), ZoneSource::CsvFile("zones.csv".to_string()));
        assert_eq!(config.confidence_threshold(), 0.70);
        assert_eq!(config.points_scale(), 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_coordinates_and_endpoint() {
        let config = parse(&[
            "--lat",
            "40.7128",
            "--lon",
            "-74.006",
            "--zones-endpoint",
            "https://zones.example.com/api/recycling/locations",
            "--method",
            "gallery",
        ]);
        assert_eq!(config.lon, Some(-74.006));
        assert_eq!(config.method, CaptureMethod::Gallery);
        assert!(matches!(config.zone_source(), ZoneSource::Endpoint(_)));
    }

    #[test]
    fn test_lat_requires_lon() {
        let result =
            CliConfig::try_parse_from(["recycle-xp", "--image", "bottle.jpg", "--lat", "40.0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = parse(&[]);
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = parse(&[]);
        config.image = "notes.txt".to_string();
        assert!(config.validate().is_err());

        let mut config = parse(&[]);
        config.classifier_endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
