//! Cervical Cancer Risk Prediction API - Main Entry Point
//!
//! Loads the trained artifacts and serves predictions over HTTP.

use anyhow::{Context, Result};
use cervical_risk_api::{
    config::AppConfig,
    metrics::{MetricsReporter, PredictionMetrics},
    models::{ArtifactCache, ArtifactLoader, RiskClassifier},
    schema::SchemaValidator,
    server::{start_server, AppState},
    service::PredictionService,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cervical-risk-api",
    about = "Serve cervical cancer risk predictions over HTTP"
)]
struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = "config/config.toml")]
    config: PathBuf,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_logging(&config.logging.level, &config.logging.format)?;
    info!("Starting Cervical Cancer Risk Prediction API");

    let table = config.risk_band_table()?;
    info!(
        schema = %config.schema.version,
        moderate = config.risk_bands.moderate,
        high = config.risk_bands.high,
        very_high = config.risk_bands.very_high,
        "Configuration loaded"
    );

    let metrics = Arc::new(PredictionMetrics::new());
    let artifacts = Arc::new(ArtifactCache::new(ArtifactLoader::new(&config.models)));

    if config.models.preload {
        match artifacts.get() {
            Ok(set) => info!(
                model = %set.model.name(),
                features = set.feature_schema.len(),
                "Artifacts preloaded"
            ),
            // predictions retry the load on each request
            Err(e) => warn!(error = %e, "Artifacts unavailable at startup"),
        }
    }

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let service = PredictionService::new(
        SchemaValidator::new(config.schema.version),
        RiskClassifier::new(table),
        artifacts,
        metrics.clone(),
    );

    start_server(AppState::new(service), &config.bind_addr()).await?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("cervical_risk_api={}", level).parse()?)
        .add_directive("tower_http=info".parse()?);

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
