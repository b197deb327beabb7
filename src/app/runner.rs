//! Wires a `SubmissionMachine` out of any `ConfigProvider` and drives a
//! single attempt to completion.

use crate::adapters::{
    CsvZoneRegistry, FileLedger, FixedPositionProvider, HttpClassifier, HttpSubmissionSink,
    HttpZoneRegistry, StillImageCamera,
};
use crate::config::cli::LocalStorage;
use crate::core::classification::ClassificationAdapter;
use crate::core::geofence;
use crate::core::position::PositionAcquirer;
use crate::core::reward::RewardPolicy;
use crate::core::submission::{AttemptOutcome, Credit, ImageSource, SubmissionMachine};
use crate::domain::model::{CaptureMethod, Coordinate, GeofenceVerdict};
use crate::domain::ports::{
    ConfigProvider, PositionProvider, SubmissionSink, ZoneRegistry, ZoneSource,
};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

const ZONE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// A simulated position fix for headless runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedFix {
    pub coordinate: Coordinate,
    pub accuracy_meters: f64,
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub method: CaptureMethod,
    pub image: Vec<u8>,
    /// Feed the image through the capture device rather than submitting it directly.
    pub use_camera: bool,
    /// `None` means no positioning capability.
    pub fix: Option<SimulatedFix>,
    pub confirm: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: AttemptOutcome,
    pub credit: Option<Credit>,
}

pub fn build_zone_registry<C: ConfigProvider + ?Sized>(
    config: &C,
    storage: LocalStorage,
) -> Result<Arc<dyn ZoneRegistry>> {
    let registry: Arc<dyn ZoneRegistry> = match config.zone_source() {
        ZoneSource::CsvFile(path) => Arc::new(CsvZoneRegistry::new(storage, path)),
        ZoneSource::Endpoint(endpoint) => {
            Arc::new(HttpZoneRegistry::new(endpoint, ZONE_FETCH_TIMEOUT)?)
        }
    };
    Ok(registry)
}

fn build_position_provider(fix: Option<SimulatedFix>) -> Arc<dyn PositionProvider> {
    let provider = match fix {
        Some(fix) => FixedPositionProvider::new(fix.coordinate, fix.accuracy_meters),
        None => FixedPositionProvider::unsupported(),
    };
    Arc::new(provider)
}

/// Builds a machine whose collaborators all come from `config`.
pub fn build_machine<C: ConfigProvider + ?Sized>(
    config: &C,
    storage: LocalStorage,
    position: Arc<dyn PositionProvider>,
) -> Result<SubmissionMachine> {
    let zones = build_zone_registry(config, storage.clone())?;

    let classifier = HttpClassifier::new(
        config.classifier_endpoint(),
        config.classifier_api_key().map(str::to_string),
        Duration::from_secs(config.classifier_timeout_seconds()),
    )?;

    let ledger = FileLedger::new(storage, config.ledger_path());

    let policy = RewardPolicy {
        confidence_threshold: config.confidence_threshold(),
        points_scale: config.points_scale(),
    };

    let mut machine = SubmissionMachine::new(
        config.user_id(),
        zones,
        PositionAcquirer::new(position, config.position_options()),
        ClassificationAdapter::new(Arc::new(classifier)),
        Arc::new(ledger),
    )
    .with_policy(policy);

    if let Some(endpoint) = config.record_endpoint() {
        let sink: Arc<dyn SubmissionSink> =
            Arc::new(HttpSubmissionSink::new(endpoint, RECORD_TIMEOUT)?);
        machine = machine.with_sink(sink);
    }

    Ok(machine)
}

/// Runs one attempt. An eligible result is credited only when `confirm` is
/// set; every other result is acknowledged and leaves the ledger alone.
pub async fn run_submission<C: ConfigProvider + ?Sized>(
    config: &C,
    storage: LocalStorage,
    request: SubmissionRequest,
) -> Result<RunReport> {
    let mut machine = build_machine(config, storage, build_position_provider(request.fix))?;

    let source = if request.use_camera {
        machine = machine.with_camera(Arc::new(StillImageCamera::new(request.image)));
        ImageSource::Camera
    } else {
        ImageSource::Bytes(request.image)
    };

    let outcome = match machine.run(request.method, source).await {
        Ok(outcome) => outcome,
        Err(e) => {
            machine.cancel().await;
            return Err(e);
        }
    };

    let credit = if request.confirm && outcome.decision.eligible {
        Some(machine.confirm().await?)
    } else {
        if request.confirm {
            tracing::info!("Nothing to confirm: this attempt earned no XP");
        }
        machine.acknowledge()?;
        None
    };

    Ok(RunReport { outcome, credit })
}

/// Evaluates a fix against the configured registry without classifying anything.
pub async fn check_location<C: ConfigProvider + ?Sized>(
    config: &C,
    storage: LocalStorage,
    coordinate: Coordinate,
) -> Result<GeofenceVerdict> {
    let zones = match build_zone_registry(config, storage)?.fetch_zones().await {
        Ok(zones) => zones,
        Err(e) => {
            tracing::warn!("⚠️ Zone registry unavailable, treating as empty: {}", e);
            Vec::new()
        }
    };
    tracing::debug!(
        "Checking ({}, {}) against {} zone(s)",
        coordinate.latitude,
        coordinate.longitude,
        zones.len()
    );
    Ok(geofence::evaluate(coordinate, &zones))
}
