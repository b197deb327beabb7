use crate::domain::model::{AcquisitionFailure, PositionOptions, PositionSample};
use crate::domain::ports::{PositionError, PositionProvider};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Single-shot position request with timeout and cache-age policy.
///
/// Never retries. Every failure is reported to the caller, which decides how
/// to degrade.
pub struct PositionAcquirer {
    provider: Arc<dyn PositionProvider>,
    options: PositionOptions,
}

impl PositionAcquirer {
    pub fn new(provider: Arc<dyn PositionProvider>, options: PositionOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &PositionOptions {
        &self.options
    }

    pub async fn acquire(&self) -> std::result::Result<PositionSample, AcquisitionFailure> {
        if !self.provider.is_supported() {
            tracing::warn!("📍 Positioning is not supported in this environment");
            return Err(AcquisitionFailure::CapabilityAbsent);
        }

        let timeout = Duration::from_millis(self.options.timeout_ms);
        tracing::debug!(
            "Requesting position (high_accuracy={}, timeout={:?}, max_cache_age_ms={})",
            self.options.high_accuracy,
            timeout,
            self.options.max_cache_age_ms
        );

        let request = self.provider.current_position(&self.options);
        let fix = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(fix)) => fix,
            Ok(Err(PositionError::PermissionDenied)) => {
                tracing::warn!("📍 Position permission denied");
                return Err(AcquisitionFailure::PermissionDenied);
            }
            Ok(Err(PositionError::PositionUnavailable(reason))) => {
                tracing::warn!("📍 Position unavailable: {}", reason);
                return Err(AcquisitionFailure::Timeout);
            }
            Ok(Err(PositionError::Timeout)) | Err(_) => {
                tracing::warn!("📍 No position within {:?}", timeout);
                return Err(AcquisitionFailure::Timeout);
            }
        };

        if fix.from_cache && !self.is_fresh(&fix.sample) {
            tracing::warn!(
                "📍 Rejecting cached fix older than {}ms",
                self.options.max_cache_age_ms
            );
            return Err(AcquisitionFailure::Timeout);
        }

        if !fix.sample.coordinate.is_within_range() {
            tracing::warn!(
                "📍 Provider returned out-of-range coordinate ({}, {})",
                fix.sample.coordinate.latitude,
                fix.sample.coordinate.longitude
            );
        }

        tracing::debug!(
            "Position acquired: ({:.6}, {:.6}) ±{:.0}m",
            fix.sample.coordinate.latitude,
            fix.sample.coordinate.longitude,
            fix.sample.accuracy_meters
        );
        Ok(fix.sample)
    }

    fn is_fresh(&self, sample: &PositionSample) -> bool {
        let age_ms = (Utc::now() - sample.timestamp).num_milliseconds();
        // max_cache_age_ms = 0 代表一定要新的定位
        self.options.max_cache_age_ms > 0 && age_ms <= self.options.max_cache_age_ms as i64
    }
}
