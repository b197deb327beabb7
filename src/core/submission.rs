//! Submission lifecycle state machine.
//!
//! ```text
//!            start(gps)                validate_location()
//!   Idle ──────────────► LocationValidating ───────────────► Capturing
//!    │                                                          ▲  │
//!    │ start(gallery)                                           │  │ submit_image()
//!    └──────────────────────────────────────────────────────────┘  ▼ capture_photo()
//!                                                             Classifying
//!        ◄──── cancel() from any state                            │
//!        ◄──── classifier / capture failure                       ▼
//!   Idle ◄──── acknowledge() / confirm() ────────────────── Result(decision)
//! ```
//!
//! A failed position fix never aborts the attempt: capture still happens but
//! the geofence verdict is unverified, so the attempt cannot earn XP.
//! Reaching `Result` credits nothing; only `confirm()` on an eligible result
//! writes to the ledger, keyed by the attempt id.

use crate::core::classification::ClassificationAdapter;
use crate::core::geofence;
use crate::core::position::PositionAcquirer;
use crate::core::reward::RewardPolicy;
use crate::domain::model::{
    CaptureMethod, GeofenceVerdict, LocationCheck, RecyclingZone, RewardDecision,
    SubmissionAttempt, SubmissionRecord,
};
use crate::domain::ports::{CaptureDevice, SubmissionSink, XpLedger, ZoneRegistry};
use crate::utils::error::{Result, XpError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on how long the audit sink may hold up a confirmation.
const RECORD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    LocationValidating,
    Capturing { camera_active: bool },
    Classifying,
    Result(RewardDecision),
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "Idle"),
            SubmissionState::LocationValidating => write!(f, "LocationValidating"),
            SubmissionState::Capturing { camera_active: true } => {
                write!(f, "Capturing (camera on)")
            }
            SubmissionState::Capturing { .. } => write!(f, "Capturing"),
            SubmissionState::Classifying => write!(f, "Classifying"),
            SubmissionState::Result(d) if d.eligible => write!(f, "Result(Eligible)"),
            SubmissionState::Result(_) => write!(f, "Result(Ineligible)"),
        }
    }
}

/// Where the attempt's single image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Camera,
}

/// Snapshot of an attempt that reached `Result`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub attempt: SubmissionAttempt,
    pub decision: RewardDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    pub attempt_id: Uuid,
    pub points: u32,
    pub balance: u64,
    /// The finished attempt with `awarded_xp` filled in.
    pub attempt: SubmissionAttempt,
}

pub struct SubmissionMachine {
    user_id: String,
    zones: Arc<dyn ZoneRegistry>,
    position: PositionAcquirer,
    classifier: ClassificationAdapter,
    ledger: Arc<dyn XpLedger>,
    camera: Option<Arc<dyn CaptureDevice>>,
    sink: Option<Arc<dyn SubmissionSink>>,
    policy: RewardPolicy,
    state: SubmissionState,
    attempt: Option<SubmissionAttempt>,
    zone_snapshot: Vec<RecyclingZone>,
}

impl SubmissionMachine {
    pub fn new(
        user_id: impl Into<String>,
        zones: Arc<dyn ZoneRegistry>,
        position: PositionAcquirer,
        classifier: ClassificationAdapter,
        ledger: Arc<dyn XpLedger>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            zones,
            position,
            classifier,
            ledger,
            camera: None,
            sink: None,
            policy: RewardPolicy::default(),
            state: SubmissionState::Idle,
            attempt: None,
            zone_snapshot: Vec::new(),
        }
    }

    pub fn with_camera(mut self, camera: Arc<dyn CaptureDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SubmissionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_policy(mut self, policy: RewardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn attempt(&self) -> Option<&SubmissionAttempt> {
        self.attempt.as_ref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Begins a new attempt, cancelling any attempt still in flight.
    pub async fn start(&mut self, method: CaptureMethod) -> Result<()> {
        if self.state != SubmissionState::Idle {
            tracing::info!("Starting a new attempt; cancelling the one in {}", self.state);
            self.cancel().await;
        }

        let attempt = SubmissionAttempt::new(method);
        tracing::info!("🚀 Attempt {} started ({})", attempt.id, method);
        self.attempt = Some(attempt);

        match method {
            CaptureMethod::Gps => {
                self.zone_snapshot = self.fetch_zone_snapshot().await;
                self.transition(SubmissionState::LocationValidating);
            }
            CaptureMethod::Gallery => {
                self.zone_snapshot.clear();
                self.transition(SubmissionState::Capturing {
                    camera_active: false,
                });
            }
        }
        Ok(())
    }

    /// Acquires a position and tests it against the attempt's zone snapshot.
    /// Positioning failures downgrade the attempt instead of aborting it.
    pub async fn validate_location(&mut self) -> Result<GeofenceVerdict> {
        self.require("validate location", |s| {
            matches!(s, SubmissionState::LocationValidating)
        })?;

        let (location, verdict) = match self.position.acquire().await {
            Ok(sample) => {
                let verdict = geofence::evaluate(sample.coordinate, &self.zone_snapshot);
                (LocationCheck::Acquired(sample), verdict)
            }
            Err(failure) => (
                LocationCheck::Failed(failure),
                GeofenceVerdict::unverified(failure.message()),
            ),
        };

        if verdict.is_inside {
            tracing::info!("📍 {}", verdict.message);
        } else {
            tracing::warn!("📍 {}", verdict.message);
        }

        let attempt = self.attempt_mut()?;
        attempt.location = location;
        attempt.geofence = Some(verdict.clone());

        self.transition(SubmissionState::Capturing {
            camera_active: false,
        });
        Ok(verdict)
    }

    /// Starts the live capture surface.
    pub async fn open_camera(&mut self) -> Result<()> {
        self.require("open the camera", |s| {
            matches!(s, SubmissionState::Capturing { camera_active: false })
        })?;

        let Some(camera) = self.camera.clone() else {
            self.reset();
            return Err(XpError::CaptureError {
                message: "no camera available".to_string(),
            });
        };

        if let Err(e) = camera.start().await {
            tracing::error!("📷 Camera failed to start: {}", e);
            camera.stop().await;
            self.reset();
            return Err(capture_error(e));
        }

        self.transition(SubmissionState::Capturing {
            camera_active: true,
        });
        Ok(())
    }

    /// Grabs one frame, releases the camera and classifies the frame.
    pub async fn capture_photo(&mut self) -> Result<RewardDecision> {
        self.require("capture a photo", |s| {
            matches!(s, SubmissionState::Capturing { camera_active: true })
        })?;

        let camera = self.camera.clone().ok_or_else(|| XpError::CaptureError {
            message: "no camera available".to_string(),
        })?;

        let frame = camera.capture_frame().await;
        // 拍完一定要釋放相機
        camera.stop().await;

        match frame {
            Ok(bytes) => self.classify_image(bytes).await,
            Err(e) => {
                tracing::error!("📷 Frame capture failed: {}", e);
                self.reset();
                Err(capture_error(e))
            }
        }
    }

    /// Hands an existing image (gallery file or capture input) to the classifier.
    pub async fn submit_image(&mut self, image: Vec<u8>) -> Result<RewardDecision> {
        self.require("submit an image", |s| {
            matches!(s, SubmissionState::Capturing { .. })
        })?;

        self.release_camera().await;
        self.classify_image(image).await
    }

    async fn classify_image(&mut self, image: Vec<u8>) -> Result<RewardDecision> {
        self.transition(SubmissionState::Classifying);

        let predictions = match self.classifier.classify(&image).await {
            Ok(predictions) if predictions.is_empty() => {
                self.reset();
                return Err(XpError::NoPredictions);
            }
            Ok(predictions) => predictions,
            Err(e) => {
                tracing::error!("🤖 Classification failed: {}", e);
                self.reset();
                return Err(e);
            }
        };

        let policy = self.policy;
        let attempt = self.attempt_mut()?;
        attempt.predictions = predictions;
        let decision = policy.decide(attempt);

        if let Some(top) = attempt.top_prediction() {
            match decision.reason {
                None => tracing::info!(
                    "✅ {} ({:.0}%) is eligible for {} XP",
                    top.material,
                    top.confidence * 100.0,
                    decision.points
                ),
                Some(reason) => tracing::info!(
                    "ℹ️ {} ({:.0}%) is not eligible: {}",
                    top.material,
                    top.confidence * 100.0,
                    reason
                ),
            }
        }

        self.transition(SubmissionState::Result(decision.clone()));
        Ok(decision)
    }

    /// Credits the ledger for an eligible result and returns to `Idle`.
    pub async fn confirm(&mut self) -> Result<Credit> {
        self.require("confirm", |s| {
            matches!(s, SubmissionState::Result(d) if d.eligible)
        })?;

        let points = match &self.state {
            SubmissionState::Result(decision) => decision.points,
            _ => 0,
        };
        let attempt = self.attempt_ref()?;
        let attempt_id = attempt.id;
        let record = attempt.top_prediction().map(|top| SubmissionRecord {
            material: top.material.clone(),
            confidence: top.confidence,
            points,
        });

        // 先入帳；入帳失敗時尚未送出紀錄，重試不會重複送出
        let balance = self.ledger.credit(&self.user_id, attempt_id, points).await?;

        if let (Some(sink), Some(record)) = (&self.sink, record) {
            match tokio::time::timeout(RECORD_TIMEOUT, sink.record(&record)).await {
                Ok(Ok(())) => tracing::debug!("Submission record sent for {}", attempt_id),
                Ok(Err(e)) => tracing::warn!("⚠️ Submission record failed (ignored): {}", e),
                Err(_) => tracing::warn!("⚠️ Submission record timed out (ignored)"),
            }
        }

        let mut attempt = self.attempt.take().ok_or_else(missing_attempt)?;
        attempt.awarded_xp = Some(points);
        tracing::info!(
            "🎉 Credited {} XP to {} (balance {})",
            points,
            self.user_id,
            balance
        );
        self.reset();

        Ok(Credit {
            attempt_id,
            points,
            balance,
            attempt,
        })
    }

    /// Leaves the result screen without crediting anything.
    pub fn acknowledge(&mut self) -> Result<()> {
        self.require("acknowledge", |s| matches!(s, SubmissionState::Result(_)))?;
        self.reset();
        Ok(())
    }

    /// Abandons the current attempt from any state. Idempotent.
    pub async fn cancel(&mut self) {
        if self.state == SubmissionState::Idle {
            return;
        }
        tracing::info!("Attempt cancelled in {}", self.state);
        self.release_camera().await;
        self.reset();
    }

    /// Drives one attempt from `Idle` to `Result`.
    pub async fn run(
        &mut self,
        method: CaptureMethod,
        source: ImageSource,
    ) -> Result<AttemptOutcome> {
        self.start(method).await?;

        if method == CaptureMethod::Gps {
            self.validate_location().await?;
        }

        let decision = match source {
            ImageSource::Bytes(bytes) => self.submit_image(bytes).await?,
            ImageSource::Camera => {
                self.open_camera().await?;
                self.capture_photo().await?
            }
        };

        Ok(AttemptOutcome {
            attempt: self.attempt_ref()?.clone(),
            decision,
        })
    }

    async fn fetch_zone_snapshot(&self) -> Vec<RecyclingZone> {
        match self.zones.fetch_zones().await {
            Ok(zones) => {
                tracing::debug!("Loaded {} zone(s) for this attempt", zones.len());
                zones
            }
            Err(e) => {
                tracing::warn!("⚠️ Zone registry unavailable, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    async fn release_camera(&mut self) {
        if let SubmissionState::Capturing { camera_active: true } = self.state {
            if let Some(camera) = &self.camera {
                tracing::debug!("📷 Releasing camera");
                camera.stop().await;
            }
            self.state = SubmissionState::Capturing {
                camera_active: false,
            };
        }
    }

    fn require(&self, action: &str, allowed: impl Fn(&SubmissionState) -> bool) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(XpError::InvalidTransition {
                state: self.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    fn transition(&mut self, next: SubmissionState) {
        tracing::debug!("State {} -> {}", self.state, next);
        self.state = next;
    }

    fn reset(&mut self) {
        self.attempt = None;
        self.zone_snapshot.clear();
        self.transition(SubmissionState::Idle);
    }

    fn attempt_ref(&self) -> Result<&SubmissionAttempt> {
        self.attempt.as_ref().ok_or_else(missing_attempt)
    }

    fn attempt_mut(&mut self) -> Result<&mut SubmissionAttempt> {
        self.attempt.as_mut().ok_or_else(missing_attempt)
    }
}

fn missing_attempt() -> XpError {
    XpError::InvalidTransition {
        state: "Idle".to_string(),
        action: "continue without an attempt".to_string(),
    }
}

fn capture_error(e: XpError) -> XpError {
    match e {
        XpError::CaptureError { .. } => e,
        other => XpError::CaptureError {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{IneligibleReason, PositionOptions};
    use crate::domain::ports::{MaterialClassifier, PositionError, PositionProvider, RawFix};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct NoZones;

    #[async_trait]
    impl ZoneRegistry for NoZones {
        async fn fetch_zones(&self) -> Result<Vec<RecyclingZone>> {
            Ok(Vec::new())
        }
    }

    struct Denied;

    #[async_trait]
    impl PositionProvider for Denied {
        fn is_supported(&self) -> bool {
            true
        }

        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> std::result::Result<RawFix, PositionError> {
            Err(PositionError::PermissionDenied)
        }
    }

    struct Fixed(serde_json::Value);

    #[async_trait]
    impl MaterialClassifier for Fixed {
        async fn classify_raw(&self, _image: &[u8]) -> Result<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingLedger {
        credits: Mutex<Vec<(String, Uuid, u32)>>,
    }

    #[async_trait]
    impl XpLedger for CountingLedger {
        async fn credit(&self, user_id: &str, attempt_id: Uuid, points: u32) -> Result<u64> {
            let mut credits = self.credits.lock().await;
            credits.push((user_id.to_string(), attempt_id, points));
            Ok(credits.iter().map(|c| u64::from(c.2)).sum())
        }

        async fn balance(&self, _user_id: &str) -> Result<u64> {
            Ok(self.credits.lock().await.iter().map(|c| u64::from(c.2)).sum())
        }
    }

    fn machine(response: serde_json::Value, ledger: Arc<CountingLedger>) -> SubmissionMachine {
        SubmissionMachine::new(
            "tester",
            Arc::new(NoZones),
            PositionAcquirer::new(Arc::new(Denied), PositionOptions::default()),
            ClassificationAdapter::new(Arc::new(Fixed(response))),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_actions_outside_their_state_are_rejected() {
        let mut m = machine(json!({"class": "glass", "confidence": 0.9}), Arc::default());

        let err = m.validate_location().await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot validate location while Idle");
        assert!(m.confirm().await.is_err());
        assert!(m.acknowledge().is_err());
        assert_eq!(m.state(), &SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_gallery_result_cannot_be_confirmed() {
        let ledger = Arc::new(CountingLedger::default());
        let mut m = machine(json!({"class": "glass", "confidence": 0.9}), ledger.clone());

        let outcome = m
            .run(CaptureMethod::Gallery, ImageSource::Bytes(b"img".to_vec()))
            .await
            .unwrap();
        assert_eq!(outcome.decision.reason, Some(IneligibleReason::DemoMode));
        assert_eq!(outcome.attempt.location, LocationCheck::NotAttempted);

        assert!(matches!(
            m.confirm().await,
            Err(XpError::InvalidTransition { .. })
        ));
        m.acknowledge().unwrap();
        assert!(ledger.credits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_denied_permission_still_reaches_result() {
        let mut m = machine(json!({"class": "paper", "confidence": 0.95}), Arc::default());

        m.start(CaptureMethod::Gps).await.unwrap();
        let verdict = m.validate_location().await.unwrap();
        assert!(!verdict.is_inside);
        assert_eq!(
            m.state(),
            &SubmissionState::Capturing {
                camera_active: false
            }
        );

        let decision = m.submit_image(b"img".to_vec()).await.unwrap();
        assert_eq!(decision.reason, Some(IneligibleReason::LocationUnverified));
        assert_eq!(
            m.attempt().map(|a| a.location.clone()),
            Some(LocationCheck::Failed(
                crate::domain::model::AcquisitionFailure::PermissionDenied
            ))
        );
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut m = machine(json!([]), Arc::default());
        m.cancel().await;

        m.start(CaptureMethod::Gps).await.unwrap();
        m.cancel().await;
        m.cancel().await;
        assert_eq!(m.state(), &SubmissionState::Idle);
        assert!(m.attempt().is_none());
    }

    #[tokio::test]
    async fn test_open_camera_without_device_resets() {
        let mut m = machine(json!([]), Arc::default());
        m.start(CaptureMethod::Gallery).await.unwrap();

        assert!(matches!(
            m.open_camera().await,
            Err(XpError::CaptureError { .. })
        ));
        assert_eq!(m.state(), &SubmissionState::Idle);
    }
}
