use axum::http::HeaderValue;

use crate::config::{Format, MetricsConfig};

/// Picks the representation for a metrics request.
///
/// Matching is exact byte equality against the configured MIME types; no
/// wildcards, parameters or quality values.
pub fn negotiate(accept: Option<&HeaderValue>, config: &MetricsConfig) -> Format {
    match accept {
        Some(accept) if accept.as_bytes() == config.exposition_mime_type.as_bytes() => Format::Exposition,
        Some(accept) if accept.as_bytes() == config.json_mime_type.as_bytes() => Format::Structured,
        _ => config.default_format,
    }
}
