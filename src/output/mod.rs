//! Output module for reporting on the stored index
//!
//! This module handles loading per-site statistics and printing them.

pub mod stats;

pub use stats::{load_statistics, print_statistics, IndexStatistics, SiteStatistics, NOT_INDEXED_YET};
