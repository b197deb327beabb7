use crate::domain::model::{Coordinate, PositionOptions, PositionSample};
use crate::domain::ports::{CaptureDevice, PositionError, PositionProvider, RawFix};
use crate::utils::error::{Result, XpError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports a fixed coordinate, or no positioning capability when built
/// without one. Used for headless runs where the fix comes from flags.
#[derive(Debug, Clone)]
pub struct FixedPositionProvider {
    fix: Option<(Coordinate, f64)>,
}

impl FixedPositionProvider {
    pub fn new(coordinate: Coordinate, accuracy_meters: f64) -> Self {
        Self {
            fix: Some((coordinate, accuracy_meters)),
        }
    }

    pub fn unsupported() -> Self {
        Self { fix: None }
    }
}

#[async_trait]
impl PositionProvider for FixedPositionProvider {
    fn is_supported(&self) -> bool {
        self.fix.is_some()
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<RawFix, PositionError> {
        let (coordinate, accuracy_meters) = self
            .fix
            .ok_or_else(|| PositionError::PositionUnavailable("no fix configured".to_string()))?;

        Ok(RawFix {
            sample: PositionSample {
                coordinate,
                accuracy_meters,
                timestamp: Utc::now(),
            },
            from_cache: false,
        })
    }
}

/// Capture device that yields a preloaded still image as its frame.
#[derive(Debug)]
pub struct StillImageCamera {
    frame: Vec<u8>,
    active: AtomicBool,
}

impl StillImageCamera {
    pub fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for StillImageCamera {
    async fn start(&self) -> Result<()> {
        if self.frame.is_empty() {
            return Err(XpError::CaptureError {
                message: "still image is empty".to_string(),
            });
        }
        self.active.store(true, Ordering::SeqCst);
        tracing::debug!("📷 Still-image camera started");
        Ok(())
    }

    async fn capture_frame(&self) -> Result<Vec<u8>> {
        if !self.is_active() {
            return Err(XpError::CaptureError {
                message: "camera is not started".to_string(),
            });
        }
        Ok(self.frame.clone())
    }

    async fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!("📷 Still-image camera stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_provider_reports_fresh_fix() {
        let provider = FixedPositionProvider::new(Coordinate::new(40.7128, -74.006), 12.0);
        assert!(provider.is_supported());

        let fix = provider
            .current_position(&PositionOptions::default())
            .await
            .unwrap();
        assert!(!fix.from_cache);
        assert_eq!(fix.sample.accuracy_meters, 12.0);
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let provider = FixedPositionProvider::unsupported();
        assert!(!provider.is_supported());
    }

    #[tokio::test]
    async fn test_still_camera_lifecycle() {
        let camera = StillImageCamera::new(b"frame".to_vec());
        assert!(camera.capture_frame().await.is_err());

        camera.start().await.unwrap();
        assert!(camera.is_active());
        assert_eq!(camera.capture_frame().await.unwrap(), b"frame".to_vec());

        camera.stop().await;
        assert!(!camera.is_active());
        // 重複 stop 不應出錯
        camera.stop().await;
    }
}
