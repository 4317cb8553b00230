//! Loan Approval Pipeline - Main Entry Point
//!
//! Consumes loan applications from NATS, encodes them for the approval model,
//! runs inference and replies with the decision.

use anyhow::Result;
use futures::StreamExt;
use loan_approval_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::ApplicationConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::loader::ModelLoader,
    pipeline::DecisionPipeline,
    producer::DecisionProducer,
    DecisionReply, LoanApplicationRecord,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("loan_approval_pipeline={}", logging.level))
    })?;

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, optionally from a path given as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;
    info!("Starting Loan Approval Pipeline");

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Load artifacts before the first application is consumed
    let loader = ModelLoader::with_threads(config.models.onnx_threads);
    let artifacts = loader.load_all(&config.models)?;
    let pipeline = Arc::new(DecisionPipeline::from_artifacts(artifacts)?);
    info!(
        features = pipeline.encoder().feature_count(),
        schema_version = %pipeline.encoder().schema_version(),
        model = %pipeline.engine().model_name(),
        "Decision pipeline initialized"
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = ApplicationConsumer::new(client.clone(), &config.nats.application_subject);
    let producer = Arc::new(DecisionProducer::new(
        client.clone(),
        &config.nats.decision_subject,
    ));

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        applications = %consumer.subject(),
        decisions = %producer.subject(),
        "Starting application processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let metrics_clone = metrics.clone();
    let interval_secs = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, interval_secs);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply_to = message.reply.clone();

            let reply = match serde_json::from_slice::<LoanApplicationRecord>(&message.payload) {
                Ok(record) => match pipeline.evaluate(&record) {
                    Ok(prediction) => {
                        let processing_time = start_time.elapsed();
                        metrics.record_decision(processing_time, prediction.decision);

                        info!(
                            application_id = %record.application_id,
                            decision = prediction.decision.as_str(),
                            raw_label = prediction.raw_label,
                            processing_time_us = processing_time.as_micros(),
                            "Application decided"
                        );

                        DecisionReply::decided(record.application_id.clone(), prediction)
                    }
                    Err(e) => {
                        metrics.record_failure(e.stage());
                        warn!(
                            application_id = %record.application_id,
                            stage = e.stage(),
                            error = %e,
                            "Application could not be evaluated"
                        );
                        DecisionReply::failed(record.application_id.clone(), &e)
                    }
                },
                Err(e) => {
                    metrics.record_failure("request");
                    warn!(error = %e, "Failed to deserialize application");
                    DecisionReply::malformed(format!("invalid application payload: {}", e))
                }
            };

            if let Err(e) = producer.publish(&reply, reply_to).await {
                error!(
                    reply_id = %reply.reply_id(),
                    error = %e,
                    "Failed to publish decision reply"
                );
            } else {
                debug!(reply_id = %reply.reply_id(), "Decision reply sent");
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            // Log progress every 100 applications
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} app/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
