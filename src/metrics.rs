//! Prometheus counters for the HTTP surface.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    response_time: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        let response_time = Histogram::with_opts(HistogramOpts::new(
            "http_response_time_seconds",
            "Response time",
        ))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(response_time.clone()))?;
        Ok(Self {
            registry,
            requests,
            response_time,
        })
    }

    pub fn count(&self, method: &str, endpoint: &str, status: &str) {
        self.requests.with_label_values(&[method, endpoint, status]).inc();
    }

    pub fn observe(&self, elapsed: Duration) {
        self.response_time.observe(elapsed.as_secs_f64());
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
