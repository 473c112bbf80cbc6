//! Pull-based metrics collection with multi-resolution aggregation and
//! retention.
//!
//! Scrapers are polled on interval boundaries; every batch is stamped with
//! the tick time, written ahead to disk, and folded into one bucket per
//! configured resolution. Queries pick the resolution closest to the window
//! and read the condensed series of the bucket covering it.

pub mod aggregator;
pub mod clock;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod metric;
pub mod metrics;
pub mod query;
pub mod repository;
pub mod scrape;
pub mod server;
