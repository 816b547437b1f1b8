//! Core domain types for the glucose report.
//!
//! This crate contains:
//! - Event and aggregate types shared by the pipeline and its consumers
//! - The error taxonomy
//! - Policy constants (sentinel floors, thresholds, rounding)
//! - Time-of-day bucket arithmetic
//! - CLI settings and the persisted policy file

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod policy;
pub mod settings;
pub mod time_utils;

pub use error::{ReportError, Result};
pub use policy::{PolicyConfig, RoundingMode};
pub use time_utils::{BucketSize, BucketSpec};
