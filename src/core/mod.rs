pub mod classification;
pub mod geofence;
pub mod position;
pub mod reward;
pub mod submission;

pub use crate::domain::model::{
    CaptureMethod, Coordinate, GeofenceVerdict, MaterialPrediction, RecyclingZone,
    RewardDecision, SubmissionAttempt,
};
pub use crate::domain::ports::{
    CaptureDevice, ConfigProvider, MaterialClassifier, PositionProvider, Storage,
    SubmissionSink, XpLedger, ZoneRegistry,
};
pub use crate::utils::error::Result;
