use crate::domain::model::{PositionOptions, PositionSample, RecyclingZone, SubmissionRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Where the zone snapshot comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneSource {
    CsvFile(String),
    Endpoint(String),
}

pub trait ConfigProvider: Send + Sync {
    fn classifier_endpoint(&self) -> &str;
    fn classifier_api_key(&self) -> Option<&str>;
    fn classifier_timeout_seconds(&self) -> u64;
    fn zone_source(&self) -> ZoneSource;
    fn position_options(&self) -> PositionOptions;
    fn confidence_threshold(&self) -> f64;
    fn points_scale(&self) -> f64;
    fn ledger_path(&self) -> &str;
    fn record_endpoint(&self) -> Option<&str>;
    fn user_id(&self) -> &str;
}

#[async_trait]
pub trait ZoneRegistry: Send + Sync {
    async fn fetch_zones(&self) -> Result<Vec<RecyclingZone>>;
}

/// Raw classifier call. The response shape is not fixed.
#[async_trait]
pub trait MaterialClassifier: Send + Sync {
    async fn classify_raw(&self, image: &[u8]) -> Result<serde_json::Value>;
}

/// Failure reported by a positioning backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    PermissionDenied,
    PositionUnavailable(String),
    Timeout,
}

/// A fix as delivered by the backend, possibly from its cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub sample: PositionSample,
    pub from_cache: bool,
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Whether the environment has positioning at all.
    fn is_supported(&self) -> bool;

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> std::result::Result<RawFix, PositionError>;
}

/// A live capture surface. `stop` must be safe to call when not started.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn capture_frame(&self) -> Result<Vec<u8>>;
    async fn stop(&self);
}

#[async_trait]
pub trait XpLedger: Send + Sync {
    /// Adds `points` to the user's counter once per attempt id; returns the new balance.
    async fn credit(&self, user_id: &str, attempt_id: Uuid, points: u32) -> Result<u64>;
    async fn balance(&self, user_id: &str) -> Result<u64>;
}

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn record(&self, record: &SubmissionRecord) -> Result<()>;
}
