use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use rollcall::{
    config::EngineConfig,
    db::{models::SessionOutcome, Database},
    fusion::FusionEngine,
    recognition::{CommandAnalyzer, FrameAnalyzer, IdentityRegistry},
    sampling::SessionController,
    schedule::SlotWatcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("rollcall starting up...");

    let data_dir = env::var("ROLLCALL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let config = EngineConfig::load_or_default(&data_dir.join("config.json"))?;
    let db = Database::new(data_dir.join("rollcall.sqlite3"))?;

    // Close out capture sessions left open by a crash. Their in-memory
    // presence data is gone, so attendance for those slots needs a manual
    // finalize once badge data is reviewed.
    for session in db.open_capture_sessions().await? {
        warn!(
            "recovered capture session {} (slot {}); marking as Aborted",
            session.id, session.slot_id
        );
        db.close_capture_session(&session.id, Utc::now(), SessionOutcome::Aborted)
            .await?;
    }

    let registry = Arc::new(IdentityRegistry::load(&data_dir.join("identities.json"))?);
    info!("loaded {} enrolled identities", registry.len());

    let analyzer: Arc<dyn FrameAnalyzer> = Arc::new(CommandAnalyzer::new(
        config.detector_command.clone(),
        config.detector_args.clone(),
    ));

    let fusion = FusionEngine::new(db.clone(), config.min_duration_minutes);
    let controller =
        SessionController::new(db.clone(), config.clone(), analyzer, registry, fusion);
    let watcher = SlotWatcher::new(db, controller.clone(), &config);

    let cancel_token = CancellationToken::new();
    let watcher_handle = tokio::spawn(watcher.run(cancel_token.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    cancel_token.cancel();
    watcher_handle
        .await
        .context("slot watcher task failed to join")?;

    // Finalize whatever session is still running before the process exits.
    if let Err(err) = controller.stop().await {
        error!("failed to close session during shutdown: {err:#}");
    }

    info!("rollcall stopped");
    Ok(())
}
