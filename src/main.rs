//! `storekey` daemon - Runs the licensing sweep scheduler.

use dotenvy::dotenv;
use std::time::Duration;
use storekey::{
    config::{database, licensing},
    core::{notify, notify::LogNotifier, sweep},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (as early as possible)
    dotenv().ok();

    // 3. Licensing parameters, defaults when config.toml is absent
    let config = licensing::load_or_default()?;
    info!(
        grace_period_days = config.licensing.grace_period_days,
        sweep_interval_secs = config.licensing.sweep_interval_secs,
        "Loaded licensing configuration"
    );

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Sweep on an interval until shutdown. The first tick fires
    // immediately, so a restart catches up right away.
    let notifier = LogNotifier;
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.licensing.sweep_interval_secs));
    info!("Sweep scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep::sweep(&db, &config.licensing).await {
                    error!("Sweep run failed: {e}");
                }
                match sweep::send_renewal_reminders(&db, &config.licensing).await {
                    Ok(queued) if queued > 0 => info!(queued, "Queued renewal reminders"),
                    Ok(_) => {}
                    Err(e) => error!("Renewal reminder pass failed: {e}"),
                }
                if let Err(e) = notify::deliver_pending(&db, &notifier).await {
                    error!("Notification delivery failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping sweep scheduler");
                break;
            }
        }
    }

    Ok(())
}
