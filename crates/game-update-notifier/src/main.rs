mod bootstrap;
mod shutdown;

use anyhow::Result;
use notifier_core::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;
    settings.validate()?;

    let ledger_path = settings.resolved_ledger_path();
    bootstrap::ensure_directories(&ledger_path)?;

    tracing::info!("game-update-notifier v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Ledger: {}, interval: {}s, timeout: {}s",
        ledger_path.display(),
        settings.interval_secs,
        settings.timeout_secs
    );

    let mut engine = bootstrap::build_engine(&settings)?;

    if settings.once {
        let report = engine.run_guarded_cycle(1).await;
        for failure in &report.failures {
            tracing::warn!("{failure}");
        }
        return Ok(());
    }

    let shutdown = shutdown::install_signal_handler();
    engine.run(shutdown).await;

    tracing::info!("bye");
    Ok(())
}
