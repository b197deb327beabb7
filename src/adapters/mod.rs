// Adapters layer: concrete implementations of the domain ports (http, storage, devices).

pub mod device;
pub mod http;
pub mod storage;

pub use device::{FixedPositionProvider, StillImageCamera};
pub use http::{HttpClassifier, HttpSubmissionSink, HttpZoneRegistry};
pub use storage::{CsvZoneRegistry, FileLedger, InMemoryLedger, StaticZoneRegistry};
