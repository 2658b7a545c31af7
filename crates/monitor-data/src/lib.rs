//! Storage layer for the session monitor.
//!
//! Owns the on-disk session directory: enumerating, decoding, atomically
//! writing and removing per-session state files.

pub mod store;

pub use monitor_core as core;
pub use store::{ScanReport, SessionStore};
