use std::sync::Arc;

use tracing::debug;

use super::histogram::RequestDurationHistogram;
use super::process::ProcessCollector;
use crate::error::{MetricsError, Result};
use crate::sampler::ProcessSampler;

/// The collector kinds a registry can hold.
pub enum Collector {
    /// Gauges read from the process sampler at render time.
    Process(ProcessCollector),
    /// The request duration histogram fed by the timing middleware.
    RequestDuration(Arc<RequestDurationHistogram>),
}

impl Collector {
    pub fn name(&self) -> &str {
        match self {
            Self::Process(_) => ProcessCollector::NAME,
            Self::RequestDuration(h) => h.name(),
        }
    }

    pub fn render(&self, out: &mut String) {
        match self {
            Self::Process(c) => c.render(out),
            Self::RequestDuration(h) => h.render(out),
        }
    }
}

/// Ordered set of uniquely named collectors.
///
/// Built once at setup, then shared read-only; collectors synchronize their
/// own state.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: Vec<Collector>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Collector) -> Result<()> {
        if self.collectors.iter().any(|c| c.name() == collector.name()) {
            return Err(MetricsError::DuplicateCollector(collector.name().to_string()));
        }
        debug!(name = collector.name(), "collector registered");
        self.collectors.push(collector);
        Ok(())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    /// Every collector's exposition text, in registration order.
    pub fn render_exposition(&self) -> String {
        let mut out = String::with_capacity(4096);
        for collector in &self.collectors {
            collector.render(&mut out);
        }
        out
    }
}

/// What setup produces: the registry served on the endpoint and the
/// histogram the timing middleware records into.
pub struct CollectorSet {
    pub registry: CollectorRegistry,
    pub request_duration: Arc<RequestDurationHistogram>,
}

impl CollectorSet {
    /// Process gauges followed by the default request duration histogram.
    pub fn standard(sampler: &Arc<ProcessSampler>) -> Result<Self> {
        Self::with_histogram(sampler, RequestDurationHistogram::new())
    }

    /// Like `standard`, with a caller-supplied histogram (e.g. custom buckets).
    pub fn with_histogram(sampler: &Arc<ProcessSampler>, histogram: RequestDurationHistogram) -> Result<Self> {
        let request_duration = Arc::new(histogram);
        let mut registry = CollectorRegistry::new();
        registry.register(Collector::Process(ProcessCollector::new(Arc::clone(sampler))))?;
        registry.register(Collector::RequestDuration(Arc::clone(&request_duration)))?;
        Ok(Self {
            registry,
            request_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::histogram::RequestLabels;

    #[test]
    fn duplicate_names_are_rejected() {
        let hist = Arc::new(RequestDurationHistogram::new());
        let mut registry = CollectorRegistry::new();
        registry.register(Collector::RequestDuration(Arc::clone(&hist))).unwrap();

        let err = registry.register(Collector::RequestDuration(hist)).unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateCollector(name) if name == "http_request_duration_ms"));
        assert_eq!(registry.names(), vec!["http_request_duration_ms"]);
    }

    #[test]
    fn renders_in_registration_order() {
        let sampler = Arc::new(ProcessSampler::new());
        let set = CollectorSet::standard(&sampler).unwrap();
        assert_eq!(set.registry.names(), vec!["process", "http_request_duration_ms"]);

        set.request_duration.observe(3.0, RequestLabels::new("GET", "/foo", 200));
        let out = set.registry.render_exposition();
        let process_at = out.find("# HELP process_versions").unwrap();
        let hist_at = out.find("# HELP http_request_duration_ms").unwrap();
        assert!(process_at < hist_at);
        assert!(out.contains("http_request_duration_ms_count{method=\"get\",path=\"/foo\",code=\"200\"} 1\n"));
    }

    #[test]
    fn empty_registry_renders_nothing() {
        assert_eq!(CollectorRegistry::new().render_exposition(), "");
    }
}
