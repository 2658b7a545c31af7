//! Runtime layer of the session monitor.
//!
//! Owns the background loops (reconciliation and pruning), the process
//! inspection seam, discovery and kill actions, and the orchestrator that
//! ties them together behind a [`SessionHandle`].

pub mod discovery;
pub mod inspector;
pub mod killer;
pub mod liveness;
pub mod orchestrator;
pub mod pruner;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use monitor_core as core;
pub use monitor_data as data;

pub use inspector::{ProcessInspector, PsInspector};
pub use orchestrator::{RuntimeConfig, SessionHandle, SessionOrchestrator};
pub use reconciler::{SessionSnapshot, SharedSnapshot};
