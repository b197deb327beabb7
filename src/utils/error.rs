use thiserror::Error;

#[derive(Error, Debug)]
pub enum XpError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Classifier service error: {message}")]
    ClassifierError { message: String },

    #[error("Classifier returned no predictions")]
    NoPredictions,

    #[error("Capture device error: {message}")]
    CaptureError { message: String },

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: String },

    #[error("Ledger error: {message}")]
    LedgerError { message: String },

    #[error("Submission record rejected: {message}")]
    SinkError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Classification,
    Device,
    Workflow,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl XpError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            XpError::ConfigError { .. }
            | XpError::ConfigValidationError { .. }
            | XpError::InvalidConfigValueError { .. }
            | XpError::MissingConfigError { .. } => ErrorCategory::Configuration,
            XpError::ApiError(_) | XpError::SinkError { .. } => ErrorCategory::Network,
            XpError::ClassifierError { .. } | XpError::NoPredictions => {
                ErrorCategory::Classification
            }
            XpError::CaptureError { .. } => ErrorCategory::Device,
            XpError::InvalidTransition { .. } => ErrorCategory::Workflow,
            XpError::CsvError(_)
            | XpError::IoError(_)
            | XpError::SerializationError(_)
            | XpError::LedgerError { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Workflow => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Classification | ErrorCategory::Device => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// 是否可以由使用者重試 (回到 Idle 後重新開始)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Classification | ErrorCategory::Device
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            XpError::ApiError(_) => {
                "Check network connectivity and the service endpoint, then retry"
            }
            XpError::ClassifierError { .. } => {
                "The classifier is unavailable; try again in a moment"
            }
            XpError::NoPredictions => "Retake the photo with the item centred and well lit",
            XpError::CaptureError { .. } => {
                "Allow camera access or choose an image from the gallery"
            }
            XpError::InvalidTransition { .. } => "Start a new attempt",
            XpError::SinkError { .. } => "The submission record endpoint rejected the payload",
            XpError::LedgerError { .. } | XpError::IoError(_) | XpError::SerializationError(_) => {
                "Check that the ledger file is readable and writable"
            }
            XpError::CsvError(_) => {
                "Check the zones CSV header: id,name,latitude,longitude,radius_meters,active"
            }
            XpError::ConfigError { .. }
            | XpError::ConfigValidationError { .. }
            | XpError::InvalidConfigValueError { .. }
            | XpError::MissingConfigError { .. } => "Fix the configuration value and rerun",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            XpError::NoPredictions => {
                "No recyclable material was detected in the photo".to_string()
            }
            XpError::ClassifierError { .. } | XpError::ApiError(_) => {
                "Could not analyse the photo right now".to_string()
            }
            XpError::CaptureError { message } => format!("Camera unavailable: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, XpError>;
