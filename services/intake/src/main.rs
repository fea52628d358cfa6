use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use intake_service::notifier::Destination;
use intake_service::{
    start_api_server, AppState, Config, DynamoRecordStore, IntakeService, IntakeSettings,
    LambdaInvoker, RekognitionLabelDetector, S3ImageStore, SnsNotifier,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Intake Service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Shared AWS configuration; each client overrides its region
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.s3.region.clone()))
        .load()
        .await;

    let record_store = DynamoRecordStore::new(&aws_config, &config.records);

    // Create the table on first start if enabled
    if config.records.create_table_if_missing {
        record_store
            .ensure_table(&config.records, config.table_wait_timeout())
            .await
            .context("Failed to prepare record table")?;
    }

    let image_store = S3ImageStore::new(&aws_config, &config.s3);
    let label_detector = RekognitionLabelDetector::new(
        &aws_config,
        &config.s3.region,
        config.labels.min_confidence,
    );
    let function_invoker = LambdaInvoker::new(&aws_config);

    let mut intake = IntakeService::new(
        Arc::new(record_store),
        Arc::new(image_store),
        Arc::new(label_detector),
        Arc::new(function_invoker),
        IntakeSettings::from_config(&config),
    );

    match Destination::from_config(&config.notification) {
        Some(destination) if config.notification.enabled => {
            info!(destination = ?destination, "Completion notifications enabled");
            intake = intake.with_notifier(Arc::new(SnsNotifier::new(
                &aws_config,
                &config.notification.region,
                destination,
            )));
        }
        _ => warn!("Completion notifications disabled"),
    }

    let state = AppState {
        intake: Arc::new(intake),
        service_name: config.service.name.clone(),
    };

    start_api_server(state, &config.api, shutdown_signal()).await?;

    info!("Intake service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
