use tracing::info;

use chirp_api::repair::{EdgeRepair, run_repair_loop};
use chirp_api::{Backend, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirp=debug,chirp_api=debug,chirp_db=info".into()),
        )
        .init();

    // Config (loads .env if present)
    let config = Config::from_env()?;

    let backend = Backend::open(&config).await?;
    let repair = EdgeRepair::new(backend);

    if config.repair_interval_secs == 0 {
        let report = repair.sweep().await?;
        info!("Repair sweep done: {} fixes ({:?})", report.total(), report);
        return Ok(());
    }

    info!("Sweeping every {}s", config.repair_interval_secs);
    tokio::select! {
        _ = run_repair_loop(repair, config.repair_interval_secs) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
    Ok(())
}
