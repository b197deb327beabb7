pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::runner::{run_submission, RunReport, SimulatedFix, SubmissionRequest};
pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::submission::{SubmissionMachine, SubmissionState};
pub use utils::error::{Result, XpError};
