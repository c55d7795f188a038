use prometheus::{Encoder, TextEncoder, HistogramOpts, HistogramVec, IntCounterVec, IntCounter, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Issuance metrics
    pub token_fetch_requests: IntCounterVec,
    pub token_fetch_failures: IntCounterVec,
    pub token_fetch_duration: HistogramVec,

    // Cache metrics
    pub cache_lookups: IntCounterVec,
    pub cache_corruptions: IntCounter,
    pub token_expiry_unix: IntGaugeVec,
}

impl Metrics {
    // metric names and label sets are static, registration cannot fail
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("hostapi_auth".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            token_fetch_requests: IntCounterVec::new(Opts::new("token_fetch_requests_total", "Token issuance attempts by cache key"), &["key"]).unwrap(),
            token_fetch_failures: IntCounterVec::new(Opts::new("token_fetch_failures_total", "Token issuance failures by reason"), &["key", "reason"]).unwrap(),
            token_fetch_duration: HistogramVec::new(HistogramOpts::new("token_fetch_duration_seconds", "Token issuance duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["key"]).unwrap(),

            cache_lookups: IntCounterVec::new(Opts::new("token_cache_lookups_total", "Token cache lookups by cache kind and result"), &["cache", "result"]).unwrap(),
            cache_corruptions: IntCounter::new("token_cache_corruptions_total", "Unreadable persisted cache entries treated as misses").unwrap(),
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the last issued token"), &["key"]).unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_fetch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_fetch_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_lookups.clone())).unwrap();
        reg.register(Box::new(metrics.cache_corruptions.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();

        metrics
    }

    /// Text exposition format, for the host application to serve or log.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
