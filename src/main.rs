//! Gesture Ensemble Pipeline - Main Entry Point
//!
//! Consumes prediction requests from NATS, runs the classifier ensemble with
//! Dirichlet confidence estimation, and publishes gesture predictions.
//! Supports parallel request processing.

use anyhow::Result;
use futures::StreamExt;
use gesture_ensemble_pipeline::{
    config::AppConfig,
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    predictor::GesturePredictor,
    producer::ResultPublisher,
    types::prediction::ErrorMessage,
    types::request::PredictRequest,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gesture_ensemble_pipeline=info".parse()?),
        )
        .init();

    info!("Starting Gesture Ensemble Pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");
    info!(
        "Ensemble heads: {:?}, classes: {}, input size: {}",
        config.models.heads, config.models.num_classes, config.models.input_size
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Load the ensemble once; heads are immutable and shared across requests
    let predictor = Arc::new(GesturePredictor::from_config(&config)?);
    info!(
        "Predictor initialized with {} heads: {:?}",
        predictor.ensemble_size(),
        predictor.head_names()
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and publisher
    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let publisher = Arc::new(ResultPublisher::new(
        client.clone(),
        &config.nats.result_subject,
    ));

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", config.nats.request_subject);
    info!("Publishing predictions to: {}", config.nats.result_subject);

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Process requests in parallel
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await.unwrap();

        // Clone shared resources for the spawned task
        let predictor = predictor.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        // Spawn task to process this request
        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply_subject = message.reply.as_ref().map(|s| s.to_string());

            match serde_json::from_slice::<PredictRequest>(&message.payload) {
                Ok(request) => {
                    let prediction = request
                        .image_bytes()
                        .and_then(|bytes| predictor.predict(&bytes));

                    match prediction {
                        Ok(result) => {
                            let processing_time = start_time.elapsed();
                            metrics.record_prediction(
                                processing_time,
                                result.class_index,
                                result.confidence,
                            );

                            if let Err(e) =
                                publisher.publish(&result.to_message(), reply_subject).await
                            {
                                error!(error = %e, "Failed to publish prediction");
                            } else {
                                debug!(
                                    prediction = %result.label(),
                                    confidence = result.confidence,
                                    processing_time_us = processing_time.as_micros(),
                                    "Prediction published"
                                );
                            }

                            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

                            // Log progress every 100 predictions
                            if count % 100 == 0 {
                                let throughput = metrics.get_throughput();
                                let processing_stats = metrics.get_processing_stats();
                                info!(
                                    processed = count,
                                    throughput = format!("{:.1} req/s", throughput),
                                    avg_latency_us = processing_stats.mean_us,
                                    "Processing milestone"
                                );
                            }
                        }
                        Err(e) => {
                            metrics.record_failure();
                            error!(error = %e, "Prediction failed");
                            if let Err(publish_err) = publisher
                                .publish_error(&ErrorMessage::new(&e), reply_subject)
                                .await
                            {
                                error!(error = %publish_err, "Failed to publish error message");
                            }
                        }
                    }
                }
                Err(e) => {
                    metrics.record_failure();
                    warn!(error = %e, "Failed to deserialize prediction request");
                    if let Err(publish_err) = publisher
                        .publish_error(&ErrorMessage::new("No image data received"), reply_subject)
                        .await
                    {
                        error!(error = %publish_err, "Failed to publish error message");
                    }
                }
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
