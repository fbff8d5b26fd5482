//! Parsing Strategies
//!
//! A parser instance handles one document at a time on one thread. The
//! strategies here build on that for workloads with many documents:
//! - parallel: independent documents on a Rayon pool, one parser each

pub mod parallel;

pub use parallel::{parse_batch, parse_events, BatchError};
