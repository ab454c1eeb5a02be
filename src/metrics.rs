//! Performance metrics and statistics tracking for the gesture pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the prediction service
pub struct PipelineMetrics {
    /// Total predictions served
    pub predictions_processed: AtomicU64,
    /// Total requests that failed with a typed error
    pub predictions_failed: AtomicU64,
    /// End-to-end processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Confidence (α₀) samples
    confidence_samples: RwLock<Vec<f64>>,
    /// Predictions per gesture class
    class_counts: RwLock<HashMap<usize, u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_processed: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_samples: RwLock::new(Vec::with_capacity(1000)),
            class_counts: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(
        &self,
        processing_time: Duration,
        class_index: usize,
        confidence: f64,
    ) {
        self.predictions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only recent samples for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut samples) = self.confidence_samples.write() {
            samples.push(confidence);
            if samples.len() > 10000 {
                samples.drain(0..5000);
            }
        }

        if let Ok(mut counts) = self.class_counts.write() {
            *counts.entry(class_index).or_insert(0) += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self.processing_times.read().unwrap();
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Mean α₀ over the recent window. High values mean the ensemble mostly
    /// agreed with itself.
    pub fn get_avg_confidence(&self) -> f64 {
        let samples = self.confidence_samples.read().unwrap();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get predictions per gesture class
    pub fn get_class_counts(&self) -> HashMap<usize, u64> {
        self.class_counts.read().unwrap().clone()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let prediction_count = self.predictions_processed.load(Ordering::Relaxed);
        let failure_count = self.predictions_failed.load(Ordering::Relaxed);
        let total = prediction_count + failure_count;
        let failure_rate = if total > 0 {
            (failure_count as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let avg_confidence = self.get_avg_confidence();
        let class_counts = self.get_class_counts();

        info!("==================== GESTURE PIPELINE METRICS ====================");
        info!(
            "Predictions: {} served, {} failed ({:.1}%), {:.1} req/s",
            prediction_count, failure_count, failure_rate, throughput
        );
        info!(
            "Processing time (us): mean={} p50={} p95={} p99={} max={}",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us,
            processing.max_us
        );
        info!("Mean confidence (alpha0): {:.2}", avg_confidence);

        if !class_counts.is_empty() {
            let mut sorted: Vec<(usize, u64)> = class_counts.into_iter().collect();
            sorted.sort();
            info!("Predictions by class:");
            for (class_index, count) in sorted {
                let pct = if prediction_count > 0 {
                    (count as f64 / prediction_count as f64) * 100.0
                } else {
                    0.0
                };
                info!("  Gesture_{}: {} ({:.1}%)", class_index, count, pct);
            }
        }
        info!("==================================================================");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), 3, 1500.0);
        metrics.record_prediction(Duration::from_micros(200), 3, 500.0);
        metrics.record_failure();

        assert_eq!(metrics.predictions_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.predictions_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_class_counts().get(&3), Some(&2));
        assert!((metrics.get_avg_confidence() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = PipelineMetrics::new();
        for us in [100, 200, 300, 400] {
            metrics.record_prediction(Duration::from_micros(us), 0, 1.0);
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
    }
}
