//! Aggregation pipeline for the glucose report.
//!
//! Responsible for loading and normalizing the CGM export, splitting it into
//! typed event views, computing daily mean glucose and time-of-day histograms,
//! and running the top-level pipeline.

pub mod aggregator;
pub mod analysis;
pub mod classifier;
pub mod histogram;
pub mod reader;

pub use glucose_core as core;
