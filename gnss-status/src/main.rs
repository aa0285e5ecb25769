use gnss_status::config;
use gnss_status::monitor::SatelliteMonitor;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::read_config(&config_path)?;

    // Initialize logging
    let _logging_guard = gnss_status::logging::init_logging(
        &config.log_dir,
        "gnss-monitor",
        &config.log_level,
    )?;

    tracing::info!("GNSS monitor starting...");
    tracing::info!(
        "Simulated receiver: update every {} ms, first fix after {} updates, mask {}°",
        config.update_interval_ms,
        config.first_fix_after_updates,
        config.elevation_mask_degrees
    );

    let stats = SatelliteMonitor::new(config.clone()).run().await?;
    tracing::info!("GNSS monitor exited after {} updates", stats.updates);

    Ok(())
}
