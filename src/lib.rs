//! Process and runtime health metrics for axum servers.
//!
//! [`MetricsPlugin`] serves a metrics endpoint in two representations, a JSON
//! snapshot and Prometheus text exposition, chosen by the `Accept` header.
//! It also times every request on the host router into the
//! `http_request_duration_ms` histogram, labelled by method, path and status.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod negotiate;
pub mod plugin;
pub mod sampler;

pub use config::{AuthCheck, Format, FormatPaths, MetricsConfig, MetricsOptions, SetupCollectors};
pub use error::{MetricsError, Result};
pub use metrics::{Collector, CollectorRegistry, CollectorSet, RequestDurationHistogram, RequestLabels};
pub use middleware::{bearer_token, UNMATCHED_PATH};
pub use negotiate::negotiate;
pub use plugin::MetricsPlugin;
pub use sampler::{MetricsSnapshot, ProcessSampler};
