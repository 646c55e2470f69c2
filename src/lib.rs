pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod report;
pub mod table;

pub use config::SimConfig;
pub use crate::core::{EstimateModel, RunOptions, SimEvent, TaskGraph};
pub use error::{Error, Result};
pub use report::SimulationReport;
