//! Request metrics and Prometheus exposition for the outcome service.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency histogram upper bounds, in seconds
pub const LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

const RECENT_WINDOW: usize = 10_000;

/// Pipeline stage reached by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transform,
    Predict,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::Predict => "predict",
        }
    }
}

/// Count and latency histogram for one (endpoint, outcome) pair
#[derive(Debug, Default)]
struct RequestSeries {
    count: AtomicU64,
    sum_us: AtomicU64,
    /// Non-cumulative bucket counts; the final slot is +Inf
    buckets: [AtomicU64; LATENCY_BUCKETS.len() + 1],
}

impl RequestSeries {
    fn observe(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();
        let slot = LATENCY_BUCKETS
            .iter()
            .position(|&le| secs <= le)
            .unwrap_or(LATENCY_BUCKETS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
    }
}

type SeriesKey = (&'static str, &'static str);

/// Metrics collector shared by all request handlers.
///
/// Counters are atomic. Two short locks exist: the series map lock, held
/// only to find or insert a series, and the recent-latency window lock, held
/// only to append one sample. Neither is held while a request is processed.
pub struct ServiceMetrics {
    requests: RwLock<BTreeMap<SeriesKey, Arc<RequestSeries>>>,
    transforms: AtomicU64,
    predictions: AtomicU64,
    bundle_loaded: AtomicU64,
    reloads_succeeded: AtomicU64,
    reloads_failed: AtomicU64,
    /// Recent request latencies (in microseconds) for logged summaries
    recent_latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(BTreeMap::new()),
            transforms: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            bundle_loaded: AtomicU64::new(0),
            reloads_succeeded: AtomicU64::new(0),
            reloads_failed: AtomicU64::new(0),
            recent_latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    fn series(&self, key: SeriesKey) -> Arc<RequestSeries> {
        if let Ok(map) = self.requests.read() {
            if let Some(series) = map.get(&key) {
                return series.clone();
            }
        }
        match self.requests.write() {
            Ok(mut map) => map.entry(key).or_default().clone(),
            // A poisoned map still gets a detached series so the caller can
            // record without panicking
            Err(_) => Arc::new(RequestSeries::default()),
        }
    }

    /// Record a finished request, whatever its outcome
    pub fn record_request(&self, endpoint: &'static str, outcome: &'static str, elapsed: Duration) {
        self.series((endpoint, outcome)).observe(elapsed);

        if let Ok(mut times) = self.recent_latencies.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only the most recent window for memory efficiency
            if times.len() > RECENT_WINDOW {
                times.drain(0..RECENT_WINDOW / 2);
            }
        }
    }

    /// Record that a request entered a pipeline stage
    pub fn record_stage(&self, stage: Stage) {
        let counter = match stage {
            Stage::Transform => &self.transforms,
            Stage::Predict => &self.predictions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bundle reload attempt
    pub fn record_reload(&self, success: bool) {
        if success {
            self.reloads_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reloads_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_bundle_loaded(&self, loaded: bool) {
        self.bundle_loaded.store(u64::from(loaded), Ordering::Relaxed);
    }

    /// Number of requests recorded for an endpoint and outcome
    pub fn request_count(&self, endpoint: &str, outcome: &str) -> u64 {
        self.requests
            .read()
            .ok()
            .and_then(|map| {
                map.iter()
                    .find(|((e, o), _)| *e == endpoint && *o == outcome)
                    .map(|(_, s)| s.count.load(Ordering::Relaxed))
            })
            .unwrap_or(0)
    }

    pub fn stage_count(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Transform => self.transforms.load(Ordering::Relaxed),
            Stage::Predict => self.predictions.load(Ordering::Relaxed),
        }
    }

    /// Total requests per outcome across endpoints
    pub fn outcome_counts(&self) -> BTreeMap<&'static str, u64> {
        let mut counts = BTreeMap::new();
        if let Ok(map) = self.requests.read() {
            for ((_, outcome), series) in map.iter() {
                *counts.entry(*outcome).or_insert(0) += series.count.load(Ordering::Relaxed);
            }
        }
        counts
    }

    pub fn total_requests(&self) -> u64 {
        self.outcome_counts().values().sum()
    }

    /// Get request latency statistics over the recent window
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.recent_latencies.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Render all metrics in the Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(4096);

        let series: Vec<(SeriesKey, Arc<RequestSeries>)> = match self.requests.read() {
            Ok(map) => map.iter().map(|(k, v)| (*k, v.clone())).collect(),
            Err(_) => Vec::new(),
        };

        out.push_str("# HELP outcome_service_requests_total Requests by endpoint and outcome\n");
        out.push_str("# TYPE outcome_service_requests_total counter\n");
        for ((endpoint, outcome), s) in &series {
            let _ = writeln!(
                out,
                "outcome_service_requests_total{{endpoint=\"{endpoint}\",outcome=\"{outcome}\"}} {}",
                s.count.load(Ordering::Relaxed)
            );
        }

        out.push_str(
            "# HELP outcome_service_request_latency_seconds Time from receipt to response\n",
        );
        out.push_str("# TYPE outcome_service_request_latency_seconds histogram\n");
        for ((endpoint, outcome), s) in &series {
            let labels = format!("endpoint=\"{endpoint}\",outcome=\"{outcome}\"");
            let mut cumulative = 0;
            for (i, le) in LATENCY_BUCKETS.iter().enumerate() {
                cumulative += s.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(
                    out,
                    "outcome_service_request_latency_seconds_bucket{{{labels},le=\"{le}\"}} {cumulative}"
                );
            }
            cumulative += s.buckets[LATENCY_BUCKETS.len()].load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "outcome_service_request_latency_seconds_bucket{{{labels},le=\"+Inf\"}} {cumulative}"
            );
            let _ = writeln!(
                out,
                "outcome_service_request_latency_seconds_sum{{{labels}}} {:.6}",
                s.sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
            );
            let _ = writeln!(
                out,
                "outcome_service_request_latency_seconds_count{{{labels}}} {}",
                s.count.load(Ordering::Relaxed)
            );
        }

        out.push_str("# HELP outcome_service_pipeline_stage_total Requests that entered a pipeline stage\n");
        out.push_str("# TYPE outcome_service_pipeline_stage_total counter\n");
        for stage in [Stage::Transform, Stage::Predict] {
            let _ = writeln!(
                out,
                "outcome_service_pipeline_stage_total{{stage=\"{}\"}} {}",
                stage.as_str(),
                self.stage_count(stage)
            );
        }

        let _ = write!(
            out,
            "# HELP outcome_service_bundle_loaded Whether an artifact bundle is active\n\
             # TYPE outcome_service_bundle_loaded gauge\n\
             outcome_service_bundle_loaded {}\n\
             # HELP outcome_service_bundle_reloads_total Bundle reload attempts\n\
             # TYPE outcome_service_bundle_reloads_total counter\n\
             outcome_service_bundle_reloads_total{{result=\"success\"}} {}\n\
             outcome_service_bundle_reloads_total{{result=\"failure\"}} {}\n\
             # HELP outcome_service_uptime_seconds Uptime in seconds\n\
             # TYPE outcome_service_uptime_seconds counter\n\
             outcome_service_uptime_seconds {}\n",
            self.bundle_loaded.load(Ordering::Relaxed),
            self.reloads_succeeded.load(Ordering::Relaxed),
            self.reloads_failed.load(Ordering::Relaxed),
            self.start_time.elapsed().as_secs()
        );

        out
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processing = self.get_processing_stats();
        let outcomes = self.outcome_counts();
        let total: u64 = outcomes.values().sum();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            TREATMENT OUTCOME SERVICE - METRICS SUMMARY       ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests: {:>8}  │  Throughput: {:>8.1} req/s             ║",
            total,
            self.get_throughput()
        );
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}   ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for (outcome, count) in &outcomes {
            let pct = if total > 0 {
                (*count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:12}: {:>8} ({:>5.1}%)                               ║", outcome, count, pct);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter that logs summaries
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately; skip it so the first summary
        // covers a full interval
        interval.tick().await;
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
    fn test_request_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request("/predict", "success", Duration::from_micros(100));
        metrics.record_request("/predict", "success", Duration::from_micros(300));
        metrics.record_request("/predict", "forbidden", Duration::from_micros(20));

        assert_eq!(metrics.request_count("/predict", "success"), 2);
        assert_eq!(metrics.request_count("/predict", "forbidden"), 1);
        assert_eq!(metrics.request_count("/predict", "internal"), 0);
        assert_eq!(metrics.total_requests(), 3);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_histogram_exposition() {
        let metrics = ServiceMetrics::new();
        metrics.record_request("/predict", "bad_request", Duration::from_millis(3));
        metrics.record_request("/predict", "bad_request", Duration::from_secs(10));

        let prom = metrics.to_prometheus();
        let labels = "endpoint=\"/predict\",outcome=\"bad_request\"";
        assert!(prom.contains(&format!(
            "outcome_service_requests_total{{{labels}}} 2"
        )));
        assert!(prom.contains(&format!(
            "outcome_service_request_latency_seconds_bucket{{{labels},le=\"0.0025\"}} 0"
        )));
        assert!(prom.contains(&format!(
            "outcome_service_request_latency_seconds_bucket{{{labels},le=\"0.005\"}} 1"
        )));
        assert!(prom.contains(&format!(
            "outcome_service_request_latency_seconds_bucket{{{labels},le=\"5\"}} 1"
        )));
        assert!(prom.contains(&format!(
            "outcome_service_request_latency_seconds_bucket{{{labels},le=\"+Inf\"}} 2"
        )));
        assert!(prom.contains(&format!(
            "outcome_service_request_latency_seconds_count{{{labels}}} 2"
        )));
    }

    #[test]
    fn test_stage_and_reload_counters() {
        let metrics = ServiceMetrics::new();
        metrics.record_stage(Stage::Transform);
        metrics.record_stage(Stage::Transform);
        metrics.record_stage(Stage::Predict);
        metrics.record_reload(true);
        metrics.record_reload(false);
        metrics.set_bundle_loaded(true);

        assert_eq!(metrics.stage_count(Stage::Transform), 2);
        let prom = metrics.to_prometheus();
        assert!(prom.contains("outcome_service_pipeline_stage_total{stage=\"predict\"} 1"));
        assert!(prom.contains("outcome_service_bundle_loaded 1"));
        assert!(prom.contains("outcome_service_bundle_reloads_total{result=\"failure\"} 1"));
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(ServiceMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        metrics.record_request("/predict", "success", Duration::from_micros(50));
                        metrics.record_stage(Stage::Transform);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.request_count("/predict", "success"), 4000);
        assert_eq!(metrics.stage_count(Stage::Transform), 4000);
    }
}
