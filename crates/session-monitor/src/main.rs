mod bootstrap;

use std::sync::Arc;

use anyhow::Result;
use monitor_core::ranking;
use monitor_core::settings::Settings;
use monitor_data::SessionStore;
use monitor_runtime::discovery::Discovery;
use monitor_runtime::killer::DEFAULT_KILL_GRACE;
use monitor_runtime::liveness::{LivenessProber, WindowPolicy};
use monitor_runtime::pruner::Pruner;
use monitor_runtime::{ProcessInspector, PsInspector, RuntimeConfig, SessionOrchestrator};
use monitor_ui::app::App;
use monitor_ui::session_list;

/// Prompt column width for the plain `list` view.
const LIST_PROMPT_WIDTH: usize = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    let monitor_dir = bootstrap::ensure_directories()?;
    // The interactive view owns the terminal, so its logs go to a file.
    let log_file = settings
        .log_file
        .clone()
        .or_else(|| (settings.view == "watch").then(|| bootstrap::default_log_file(&monitor_dir)));
    bootstrap::setup_logging(&settings.log_level, log_file.as_deref())?;

    let sessions_dir = settings.sessions_path();
    bootstrap::ensure_sessions_dir(&sessions_dir)?;

    tracing::info!("Session Monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        view = %settings.view,
        sessions_dir = %sessions_dir.display(),
        theme = %settings.theme,
        "settings loaded"
    );

    let inspector: Arc<dyn ProcessInspector> = Arc::new(PsInspector::new());
    let store = SessionStore::new(&sessions_dir);

    match settings.view.as_str() {
        "watch" => {
            let config = RuntimeConfig {
                sessions_dir: sessions_dir.clone(),
                refresh_interval: settings.refresh_interval(),
                prune_interval: settings.prune_interval(),
                window_ttl: settings.window_ttl(),
                program: settings.program.clone(),
                kill_grace: DEFAULT_KILL_GRACE,
            };
            let handle = SessionOrchestrator::new(config, inspector).start();

            let app = App::new(
                &settings.theme,
                sessions_dir.display().to_string(),
                settings.stale_threshold(),
            );

            // The TUI exits on 'q' / Ctrl+C itself; the OS-level handler covers
            // signals that arrive while the terminal is in raw mode.
            tokio::select! {
                result = app.run(&handle) => {
                    handle.abort();
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down session loops");
                    handle.abort();
                }
            }
        }

        "list" => {
            let sessions = tokio::task::spawn_blocking(move || ranking::ranked(store.list_all()))
                .await?;
            if sessions.is_empty() {
                println!("No active sessions in {}", sessions_dir.display());
            } else {
                let lines = session_list::plain_lines(
                    &sessions,
                    chrono::Utc::now(),
                    settings.stale_threshold(),
                    LIST_PROMPT_WIDTH,
                );
                for line in lines {
                    println!("{line}");
                }
            }
        }

        "discover" => {
            let discovery = Discovery::new(store, inspector, &settings.program);
            let report = tokio::task::spawn_blocking(move || discovery.run()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        "prune" => {
            let pruner = Pruner::new(
                store.clone(),
                LivenessProber::new(inspector),
                WindowPolicy::new(settings.window_ttl()),
            );
            let report = tokio::task::spawn_blocking(move || pruner.run_cycle(&store.list_all()))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        unknown => {
            eprintln!("Unknown view mode: {}", unknown);
        }
    }

    Ok(())
}
