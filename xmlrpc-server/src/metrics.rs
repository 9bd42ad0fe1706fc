//! Prometheus metrics for the XML-RPC endpoint.
//!
//! Exposed in text format at `/metrics` when enabled.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

/// Request duration histogram buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

/// Label used for calls to methods that are not registered.
pub const UNKNOWN_METHOD: &str = "unknown";

/// Content type of the text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metrics for the server.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Total connections accepted.
    pub connections_total: Counter,
    /// Currently active connections.
    pub connections_active: Gauge,
    /// Dispatched calls by method.
    pub requests_total: CounterVec,
    /// Fault responses by fault code.
    pub faults_total: CounterVec,
    /// Calls that failed without producing a response document.
    pub failures_total: Counter,
    /// Dispatch duration by method.
    pub request_duration: HistogramVec,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connections_total = Counter::with_opts(Opts::new(
            "xmlrpc_connections_total",
            "Total number of connections accepted",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_active = Gauge::with_opts(Opts::new(
            "xmlrpc_connections_active",
            "Number of currently active connections",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        let requests_total = CounterVec::new(
            Opts::new("xmlrpc_requests_total", "Total dispatched calls by method"),
            &["method"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let faults_total = CounterVec::new(
            Opts::new("xmlrpc_faults_total", "Total fault responses by fault code"),
            &["code"],
        )?;
        registry.register(Box::new(faults_total.clone()))?;

        let failures_total = Counter::with_opts(Opts::new(
            "xmlrpc_failures_total",
            "Total calls rejected or failed without a response document",
        ))?;
        registry.register(Box::new(failures_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "xmlrpc_request_duration_seconds",
                "Dispatch duration in seconds by method",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["method"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            connections_total,
            connections_active,
            requests_total,
            faults_total,
            failures_total,
            request_duration,
        })
    }

    /// Records one dispatched call.
    pub fn observe_call(&self, method: &str, seconds: f64, fault_code: Option<i32>) {
        self.requests_total.with_label_values(&[method]).inc();
        self.request_duration
            .with_label_values(&[method])
            .observe(seconds);
        if let Some(code) = fault_code {
            self.faults_total
                .with_label_values(&[&code.to_string()])
                .inc();
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
