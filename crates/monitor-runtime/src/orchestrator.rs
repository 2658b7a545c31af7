//! Async session orchestrator.
//!
//! Spawns the reconciliation and pruning loops as independent tokio tasks
//! sharing one `watch` channel of [`SessionSnapshot`]s, and hands the caller a
//! [`SessionHandle`] for reading the view and triggering on-demand actions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use monitor_core::error::{MonitorError, Result};
use monitor_data::store::SessionStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::discovery::{Discovery, DiscoveryReport};
use crate::inspector::ProcessInspector;
use crate::killer::{Killer, DEFAULT_KILL_GRACE};
use crate::liveness::{LivenessProber, WindowPolicy, DEFAULT_WINDOW_TTL};
use crate::pruner::{PruneReport, Pruner, DEFAULT_PRUNE_INTERVAL};
use crate::reconciler::{session_channel, Reconciler, SharedSnapshot, DEFAULT_REFRESH_INTERVAL};

// ── RuntimeConfig ─────────────────────────────────────────────────────────────

/// Everything the background loops need to know.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub sessions_dir: PathBuf,
    pub refresh_interval: Duration,
    pub prune_interval: Duration,
    /// `None` keeps window-addressable sessions forever.
    pub window_ttl: Option<Duration>,
    /// Agent program name used by discovery and kill.
    pub program: String,
    pub kill_grace: Duration,
}

impl RuntimeConfig {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            window_ttl: Some(DEFAULT_WINDOW_TTL),
            program: "claude".to_string(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

// ── SessionOrchestrator ───────────────────────────────────────────────────────

/// Background session coordinator.
///
/// Call [`SessionOrchestrator::start`] inside a tokio runtime to spin up both
/// loops.
pub struct SessionOrchestrator {
    config: RuntimeConfig,
    inspector: Arc<dyn ProcessInspector>,
}

impl SessionOrchestrator {
    pub fn new(config: RuntimeConfig, inspector: Arc<dyn ProcessInspector>) -> Self {
        Self { config, inspector }
    }

    /// Start reconciliation and pruning.
    pub fn start(self) -> SessionHandle {
        let config = self.config;
        let store = SessionStore::new(&config.sessions_dir);
        let (tx, rx) = session_channel();

        let pruner = Arc::new(Pruner::new(
            store.clone(),
            LivenessProber::new(Arc::clone(&self.inspector)),
            WindowPolicy::new(config.window_ttl),
        ));

        let reconcile_task = tokio::spawn(
            Reconciler::new(store.clone(), config.refresh_interval).run(tx),
        );
        let prune_task = tokio::spawn(Arc::clone(&pruner).run(rx.clone(), config.prune_interval));

        tracing::info!(
            sessions_dir = %config.sessions_dir.display(),
            refresh_ms = config.refresh_interval.as_millis() as u64,
            prune_secs = config.prune_interval.as_secs(),
            "session monitoring started"
        );

        SessionHandle {
            rx,
            store: store.clone(),
            pruner,
            discovery: Arc::new(Discovery::new(
                store.clone(),
                Arc::clone(&self.inspector),
                &config.program,
            )),
            killer: Killer::new(store, self.inspector, &config.program, config.kill_grace),
            tasks: vec![reconcile_task, prune_task],
        }
    }
}

// ── SessionHandle ─────────────────────────────────────────────────────────────

/// A handle to the running loops.
///
/// Dropping every receiver (this handle included) lets the loops wind down on
/// their next tick; [`SessionHandle::abort`] stops them immediately.
pub struct SessionHandle {
    rx: watch::Receiver<SharedSnapshot>,
    store: SessionStore,
    pruner: Arc<Pruner>,
    discovery: Arc<Discovery>,
    killer: Killer,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    /// A new receiver for the published view.
    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot> {
        self.rx.clone()
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> SharedSnapshot {
        Arc::clone(&self.rx.borrow())
    }

    /// Run one pruning cycle right now against a fresh read of the directory.
    pub async fn prune_now(&self) -> Result<PruneReport> {
        let store = self.store.clone();
        let sessions = tokio::task::spawn_blocking(move || store.list_all())
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))?;
        Ok(self.pruner.prune(Arc::from(sessions)).await)
    }

    /// Run a discovery pass on a blocking worker.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let discovery = Arc::clone(&self.discovery);
        tokio::task::spawn_blocking(move || discovery.run())
            .await
            .map_err(|e| MonitorError::Task(e.to_string()))
    }

    /// Terminate a session. The record disappears after the grace delay.
    ///
    /// Returns `false` when no such session exists.
    pub async fn kill(&self, session_id: &str) -> Result<bool> {
        Ok(self.killer.kill(session_id).await?.is_some())
    }

    /// Immediately abort both loops.
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
