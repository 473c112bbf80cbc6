//! Types shared by the tally collector and its consumers.
//!
//! Everything in here is plain data plus the calendar arithmetic that maps
//! instants onto resolution buckets. Nothing in this crate performs I/O.

pub mod types;
