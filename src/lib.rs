//! Attendance risk alerts and reporting aggregation for vocational-training cohorts.
//!
//! The crate reads attendance history through an [`store::AttendanceStore`],
//! flags learners whose unexcused absences cross the configured thresholds,
//! and folds those detections into cohort, instructor and coordination views.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod range;
pub mod report;
pub mod risk;
pub mod store;
pub mod telemetry;

pub use aggregate::AggregationEngine;
pub use error::{EngineError, StoreError};
pub use range::DateRange;
pub use risk::{AlertEngine, Criterion, LearnerAlert, StreakMode};
