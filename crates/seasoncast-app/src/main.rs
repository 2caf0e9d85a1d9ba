// Season simulator entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the prediction API client
// 4. Create mpsc channels
// 5. Spawn app logic task
// 6. Run the console front end until the user quits
// 7. Cleanup on exit

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use seasoncast_api::{ApiClient, PredictionService};
use seasoncast_app::app;
use seasoncast_app::config;
use seasoncast_app::console;
use seasoncast_app::protocol::UserCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Seasoncast starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} {}, backend {}",
        config.season.name, config.season.year, config.api.base_url
    );

    // 3. Build the API client
    let client = ApiClient::new(&config.api.base_url, config.api.timeout())
        .context("failed to build API client")?;
    let service: Arc<dyn PredictionService> = Arc::new(client);

    // 4. Create mpsc channels
    let (pipeline_tx, pipeline_rx) = mpsc::channel(64);
    let (timer_tx, timer_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let autoplay = config.playback.autoplay;
    let app_state = app::AppState::new(config, service, pipeline_tx, timer_tx, ui_tx);

    // 5. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(pipeline_rx, timer_rx, cmd_rx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    if autoplay {
        cmd_tx
            .send(UserCommand::Start)
            .await
            .context("application loop exited before start")?;
    }

    // 6. The console consumes ui_rx and sends commands through cmd_tx until
    // the user quits or stdin closes.
    if let Err(e) = console::run(ui_rx, cmd_tx).await {
        error!("Console error: {}", e);
    }

    // 7. Cleanup: wait for app task to finish (with timeout)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Seasoncast shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which shows the
/// season).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("seasoncast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("seasoncast_app=info,seasoncast_core=info,seasoncast_api=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
