//! Terminal UI layer for the session monitor.
//!
//! Provides themes, the header component, the ranked session list view, and
//! the main application event loop built on top of [`ratatui`].

pub mod app;
pub mod components;
pub mod session_list;
pub mod themes;

pub use monitor_core as core;
