//! Core types for the session monitor.
//!
//! Holds the session record model, the state-file codec, status ranking,
//! display formatting helpers, CLI settings and the shared error type.

pub mod codec;
pub mod error;
pub mod formatting;
pub mod models;
pub mod ranking;
pub mod settings;

pub use error::{MonitorError, Result};
pub use models::{SessionRecord, SessionStatus, TerminalKind};
