use thiserror::Error;

/// Everything that can go wrong while wiring the plugin up.
///
/// All of these are setup-time failures: once `MetricsPlugin::register`
/// succeeds, recording and rendering are infallible.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("defaultFormat must be exposition or json")]
    InvalidDefaultFormat,

    #[error("path must start with '/', got {0:?}")]
    InvalidPath(String),

    #[error("{option} is not a valid MIME type: {value:?}")]
    InvalidMimeType { option: &'static str, value: String },

    #[error("a collector named {0:?} is already registered")]
    DuplicateCollector(String),

    #[error("histogram buckets must be finite and strictly ascending, got {0:?}")]
    InvalidBuckets(Vec<f64>),
}

pub type Result<T, E = MetricsError> = std::result::Result<T, E>;
