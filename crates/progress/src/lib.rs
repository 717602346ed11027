//! Progress monitoring
//!
//! The goal/task monitor, its configuration, and status reporting.

#![warn(missing_docs)]

pub mod config;
pub mod monitor;
pub mod report;

pub use config::MonitorConfig;
pub use monitor::Monitor;
pub use report::{progress_bar, StatusCounts, StatusReport, TaskSummary};
