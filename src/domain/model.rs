use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Radius applied to zones registered without one.
pub const DEFAULT_ZONE_RADIUS_METERS: f64 = 100.0;

/// WGS-84 position in degrees. Out-of-range values are carried as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_within_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecyclingZone {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(
        default = "default_radius",
        alias = "radiusMeters",
        deserialize_with = "radius_or_default"
    )]
    pub radius_meters: f64,
    #[serde(default = "default_active", deserialize_with = "active_or_default")]
    pub active: bool,
}

impl RecyclingZone {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            radius_meters: DEFAULT_ZONE_RADIUS_METERS,
            active: true,
        }
    }

    pub fn with_radius(mut self, radius_meters: f64) -> Self {
        self.radius_meters = normalize_radius(Some(radius_meters));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

fn default_radius() -> f64 {
    DEFAULT_ZONE_RADIUS_METERS
}

fn default_active() -> bool {
    true
}

/// Missing, zero, negative or non-finite radii fall back to the default.
pub fn normalize_radius(radius: Option<f64>) -> f64 {
    match radius {
        Some(r) if r.is_finite() && r > 0.0 => r,
        _ => DEFAULT_ZONE_RADIUS_METERS,
    }
}

fn radius_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let radius: Option<f64> = Option::deserialize(deserializer)?;
    Ok(normalize_radius(radius))
}

fn active_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let active: Option<bool> = Option::deserialize(deserializer)?;
    Ok(active.unwrap_or(true))
}

// registry 有時回傳數字 id
fn id_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Positioning request options understood by every `PositionProvider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    /// Oldest cached fix accepted; 0 forces a fresh fix.
    pub max_cache_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            max_cache_age_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub accuracy_meters: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionFailure {
    /// The environment has no positioning capability at all.
    CapabilityAbsent,
    PermissionDenied,
    /// No acceptable fix arrived within the timeout.
    Timeout,
}

impl AcquisitionFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AcquisitionFailure::CapabilityAbsent => "GPS not supported on this device",
            AcquisitionFailure::PermissionDenied => {
                "GPS permission denied. Location verification unavailable."
            }
            AcquisitionFailure::Timeout => "GPS timed out. Location verification unavailable.",
        }
    }
}

/// Location status of an attempt. `NotAttempted` is distinct from a failed fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationCheck {
    NotAttempted,
    Acquired(PositionSample),
    Failed(AcquisitionFailure),
}

impl LocationCheck {
    pub fn sample(&self) -> Option<&PositionSample> {
        match self {
            LocationCheck::Acquired(sample) => Some(sample),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceVerdict {
    pub is_inside: bool,
    pub matched_zone_id: Option<String>,
    pub matched_zone_name: Option<String>,
    /// Distance to the matched zone, or to the nearest zone when outside.
    /// `None` when there were no active zones.
    pub distance_meters: Option<f64>,
    pub nearest_zone_name: Option<String>,
    pub message: String,
}

impl GeofenceVerdict {
    /// Verdict used when no position could be acquired.
    pub fn unverified(message: impl Into<String>) -> Self {
        Self {
            is_inside: false,
            matched_zone_id: None,
            matched_zone_name: None,
            distance_meters: None,
            nearest_zone_name: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPrediction {
    pub material: String,
    pub confidence: f64,
}

impl MaterialPrediction {
    pub fn new(material: impl Into<String>, confidence: f64) -> Self {
        Self {
            material: material.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Existing file, never reward-eligible.
    Gallery,
    /// Live capture accompanied by a location check.
    Gps,
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMethod::Gallery => write!(f, "gallery"),
            CaptureMethod::Gps => write!(f, "gps"),
        }
    }
}

impl std::str::FromStr for CaptureMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gallery" => Ok(CaptureMethod::Gallery),
            "gps" => Ok(CaptureMethod::Gps),
            other => Err(format!("unknown capture method '{}' (expected gallery or gps)", other)),
        }
    }
}

/// One user action from trigger to terminal state. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub id: Uuid,
    pub capture_method: CaptureMethod,
    pub location: LocationCheck,
    pub geofence: Option<GeofenceVerdict>,
    pub predictions: Vec<MaterialPrediction>,
    pub awarded_xp: Option<u32>,
}

impl SubmissionAttempt {
    pub fn new(capture_method: CaptureMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            capture_method,
            location: LocationCheck::NotAttempted,
            geofence: None,
            predictions: Vec::new(),
            awarded_xp: None,
        }
    }

    pub fn top_prediction(&self) -> Option<&MaterialPrediction> {
        self.predictions.first()
    }

    pub fn is_inside_zone(&self) -> bool {
        self.geofence.as_ref().map(|g| g.is_inside).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IneligibleReason {
    DemoMode,
    LocationUnverified,
    LowConfidence,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::DemoMode => write!(f, "demo-mode"),
            IneligibleReason::LocationUnverified => write!(f, "location-unverified"),
            IneligibleReason::LowConfidence => write!(f, "low-confidence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDecision {
    pub eligible: bool,
    pub reason: Option<IneligibleReason>,
    /// XP to credit on confirmation; zero when ineligible.
    pub points: u32,
}

/// Payload sent to the audit sink on confirmed attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub material: String,
    pub confidence: f64,
    pub points: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_defaults_from_json() {
        let zone: RecyclingZone = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Harbor Depot",
            "latitude": 40.7,
            "longitude": -74.0
        }))
        .unwrap();

        assert_eq!(zone.id, "7");
        assert_eq!(zone.radius_meters, DEFAULT_ZONE_RADIUS_METERS);
        assert!(zone.active);
    }

    #[test]
    fn test_zone_zero_or_null_radius_uses_default() {
        let zone: RecyclingZone = serde_json::from_value(serde_json::json!({
            "id": "a",
            "name": "Zero",
            "latitude": 0.0,
            "longitude": 0.0,
            "radiusMeters": 0,
            "active": null
        }))
        .unwrap();

        assert_eq!(zone.radius_meters, DEFAULT_ZONE_RADIUS_METERS);
        assert!(zone.active);
    }

    #[test]
    fn test_capture_method_parse() {
        assert_eq!("GPS".parse::<CaptureMethod>().unwrap(), CaptureMethod::Gps);
        assert_eq!(
            "gallery".parse::<CaptureMethod>().unwrap(),
            CaptureMethod::Gallery
        );
        assert!("camera".parse::<CaptureMethod>().is_err());
    }

    #[test]
    fn test_reason_wire_names() {
        assert_eq!(IneligibleReason::DemoMode.to_string(), "demo-mode");
        assert_eq!(
            serde_json::to_value(IneligibleReason::LocationUnverified).unwrap(),
            serde_json::json!("location-unverified")
        );
    }

    #[test]
    fn test_new_attempt_has_not_attempted_location() {
        let attempt = SubmissionAttempt::new(CaptureMethod::Gps);
        assert_eq!(attempt.location, LocationCheck::NotAttempted);
        assert!(attempt.location.sample().is_none());
        assert!(!attempt.is_inside_zone());
    }
}
