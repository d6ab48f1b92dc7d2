//! # Ecodan Common Library
//!
//! Shared code for the Ecodan heat-pump telemetry binaries:
//! - Record model (channel table, readings, fixed-point energy, summaries)
//! - Live collector with periodic flush
//! - Persisted record stream (CSV) with schema rotation
//! - Batch engine: normaliser, segmentation, counter reconciliation,
//!   efficiency ratios, daily summaries and month/year rollups
//! - Period analysis
//! - Configuration loading

pub mod analysis;
pub mod collector;
pub mod config;
pub mod daily;
pub mod efficiency;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod rollup;
pub mod segment;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use model::{Channel, ChannelKind, Reading};
