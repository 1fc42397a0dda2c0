use anyhow::Context;
use market_movers::config::AppConfig;
use market_movers::yahoo::YahooClient;
use market_movers::{collector, report};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let app_config = AppConfig::load().context("Failed to load configuration")?;

    tracing::info!("Starting market-movers");
    tracing::info!(
        symbols = app_config.watchlist.len(),
        surge = app_config.thresholds.surge,
        plunge = app_config.thresholds.plunge,
        output = %app_config.output_path.display(),
        "Loaded configuration"
    );

    let mut client = YahooClient::new(
        &app_config.provider_base_url,
        app_config.request_timeout,
        app_config.random_agent,
    )
    .context("Failed to initialize price history client")?;

    let records = collector::collect(&mut client, &app_config.watchlist, &app_config.thresholds).await;

    let generated_at = report::generated_at(app_config.timezone);
    let document = report::render(&records, &generated_at, app_config.language);
    report::write_report(&app_config.output_path, &document)
        .with_context(|| format!("Failed to write report to {}", app_config.output_path.display()))?;

    tracing::info!(records = records.len(), "Report generated");
    Ok(())
}
