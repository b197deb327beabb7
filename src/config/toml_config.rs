use crate::core::classification::DEFAULT_POINTS_SCALE;
use crate::core::reward::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::core::ConfigProvider;
use crate::domain::model::PositionOptions;
use crate::domain::ports::ZoneSource;
use crate::utils::error::{Result, XpError};
use crate::utils::validation::{validate_required_field, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_CLASSIFIER_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_USER_ID: &str = "local-user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub classifier: ClassifierConfig,
    pub zones: ZonesConfig,
    #[serde(default)]
    pub positioning: PositioningConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    pub ledger: LedgerConfig,
    pub telemetry: Option<TelemetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Exactly one of `csv_path` or `endpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    pub csv_path: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositioningConfig {
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_cache_age_ms: u64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        let options = PositionOptions::default();
        Self {
            high_accuracy: options.high_accuracy,
            timeout_ms: options.timeout_ms,
            max_cache_age_ms: options.max_cache_age_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardConfig {
    pub confidence_threshold: Option<f64>,
    pub points_scale: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub path: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub record_endpoint: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    PositionOptions::default().timeout_ms
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ${VAR_NAME}
        Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(XpError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| XpError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLASSIFIER_API_KEY})；未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if self.zones.csv_path.is_some() && self.zones.endpoint.is_some() {
            return Err(XpError::ConfigError {
                message: "[zones] must set either csv_path or endpoint, not both".to_string(),
            });
        }
        let zone_source = self.zones.endpoint.as_ref().or(self.zones.csv_path.as_ref());
        validate_required_field("zones.csv_path or zones.endpoint", &zone_source)?;

        if let Some(key) = &self.classifier.api_key {
            if env_var_pattern().is_match(key) {
                tracing::warn!("⚠️ classifier.api_key references an unset environment variable");
            }
        }

        super::validate_provider(self)
    }

    pub fn record_endpoint(&self) -> Option<&str> {
        self.telemetry
            .as_ref()
            .and_then(|t| t.record_endpoint.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn classifier_endpoint(&self) -> &str {
        &self.classifier.endpoint
    }

    fn classifier_api_key(&self) -> Option<&str> {
        self.classifier
            .api_key
            .as_deref()
            .filter(|key| !env_var_pattern().is_match(key))
    }

    fn classifier_timeout_seconds(&self) -> u64 {
        self.classifier
            .timeout_seconds
            .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT_SECONDS)
    }

    fn zone_source(&self) -> ZoneSource {
        match (&self.zones.endpoint, &self.zones.csv_path) {
            (Some(endpoint), _) => ZoneSource::Endpoint(endpoint.clone()),
            (None, Some(path)) => ZoneSource::CsvFile(path.clone()),
            (None, None) => ZoneSource::CsvFile(String::new()),
        }
    }

    fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.positioning.high_accuracy,
            timeout_ms: self.positioning.timeout_ms,
            max_cache_age_ms: self.positioning.max_cache_age_ms,
        }
    }

    fn confidence_threshold(&self) -> f64 {
        self.reward
            .confidence_threshold
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD)
    }

    fn points_scale(&self) -> f64 {
        self.reward.points_scale.unwrap_or(DEFAULT_POINTS_SCALE)
    }

    fn ledger_path(&self) -> &str {
        &self.ledger.path
    }

    fn record_endpoint(&self) -> Option<&str> {
        TomlConfig::record_endpoint(self)
    }

    fn user_id(&self) -> &str {
        self.ledger.user_id.as_deref().unwrap_or(DEFAULT_USER_ID)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
