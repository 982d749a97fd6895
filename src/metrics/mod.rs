pub mod exposition;
pub mod histogram;
pub mod percentiles;
pub mod process;
pub mod registry;

pub use histogram::{RequestDurationHistogram, RequestLabels, SeriesSnapshot, DEFAULT_BUCKETS};
pub use process::ProcessCollector;
pub use registry::{Collector, CollectorRegistry, CollectorSet};
