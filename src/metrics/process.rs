//! Exposition view of the `ProcessSampler` snapshot.

use std::sync::Arc;

use super::exposition::{self, MetricKind};
use crate::sampler::{MetricsSnapshot, ProcessSampler};

/// Gauges derived from a fresh snapshot on every render.
pub struct ProcessCollector {
    sampler: Arc<ProcessSampler>,
}

impl ProcessCollector {
    pub const NAME: &'static str = "process";

    pub fn new(sampler: Arc<ProcessSampler>) -> Self {
        Self { sampler }
    }

    pub fn render(&self, out: &mut String) {
        render_snapshot(&self.sampler.sample(), out);
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    exposition::write_header(out, name, help, MetricKind::Gauge);
    exposition::write_sample(out, name, &[], value);
}

pub fn render_snapshot(s: &MetricsSnapshot, out: &mut String) {
    // ── Process ─────────────────────────────────────────────────
    exposition::write_header(out, "process_versions", "Versions of the process and its platform", MetricKind::Gauge);
    let versions: Vec<(&str, &str)> = s
        .process
        .versions
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    exposition::write_sample(out, "process_versions", &versions, 1);

    gauge(out, "process_uptime_seconds", "Process uptime in seconds", s.process.uptime);
    gauge(
        out,
        "process_start_time_seconds",
        "Start time of the process since unix epoch in seconds",
        s.process.started_at.timestamp(),
    );
    gauge(out, "process_resident_memory_bytes", "Resident memory size in bytes", s.process.memory.rss);
    gauge(out, "process_virtual_memory_bytes", "Virtual memory size in bytes", s.process.memory.virtual_bytes);
    gauge(out, "process_open_handles", "Number of open handles", s.handles);
    gauge(out, "process_active_requests", "Number of requests currently in flight", s.requests);

    // ── Runtime ─────────────────────────────────────────────────
    gauge(out, "runtime_event_loop_delay_ms", "Delay of the async runtime event loop", s.loop_delay);
    gauge(
        out,
        "runtime_event_loop_delay_p50_ms",
        "Median delay of the async runtime event loop",
        s.loop_stats.p50_ms,
    );
    gauge(
        out,
        "runtime_event_loop_delay_p99_ms",
        "99th percentile delay of the async runtime event loop",
        s.loop_stats.p99_ms,
    );
    gauge(
        out,
        "runtime_event_loop_delay_max_ms",
        "Maximum delay of the async runtime event loop",
        s.loop_stats.max_ms,
    );

    // ── System ──────────────────────────────────────────────────
    exposition::write_header(out, "system_load_average", "System load average", MetricKind::Gauge);
    for (window, value) in [("1m", s.system.load.one), ("5m", s.system.load.five), ("15m", s.system.load.fifteen)] {
        exposition::write_sample(out, "system_load_average", &[("window", window)], value);
    }
    gauge(out, "system_memory_free_bytes", "Free system memory in bytes", s.system.free_memory);
    gauge(
        out,
        "system_memory_available_bytes",
        "Available system memory in bytes",
        s.system.available_memory,
    );
    gauge(out, "system_memory_total_bytes", "Total system memory in bytes", s.system.total_memory);
    gauge(out, "system_uptime_seconds", "System uptime in seconds", s.system.uptime);

    exposition::write_header(out, "system_cpu_usage_percent", "CPU usage per core", MetricKind::Gauge);
    for cpu in &s.cpu {
        exposition::write_sample(out, "system_cpu_usage_percent", &[("cpu", cpu.name.as_str())], cpu.usage);
    }
    exposition::write_header(out, "system_cpu_frequency_mhz", "CPU frequency per core", MetricKind::Gauge);
    for cpu in &s.cpu {
        exposition::write_sample(out, "system_cpu_frequency_mhz", &[("cpu", cpu.name.as_str())], cpu.frequency);
    }
}
