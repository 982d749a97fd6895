use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::{Format, MetricsConfig};
use crate::metrics::CollectorRegistry;
use crate::negotiate::negotiate;
use crate::sampler::ProcessSampler;

use super::ApiError;

/// Everything the endpoint reads. Nothing here is mutated by the handler.
pub struct EndpointState {
    pub config: Arc<MetricsConfig>,
    pub sampler: Arc<ProcessSampler>,
    pub registry: Arc<CollectorRegistry>,
}

// ─── GET <path> ──────────────────────────────────────────────────

/// Serves a fresh snapshot as JSON or the full registry as exposition
/// text, depending on `Accept`. Nothing is cached between calls.
pub async fn get_metrics(
    State(state): State<Arc<EndpointState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let config = &state.config;

    match negotiate(headers.get(header::ACCEPT), config) {
        Format::Structured => {
            let body = serde_json::to_vec(&state.sampler.sample()).map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(([(header::CONTENT_TYPE, config.json_mime_type.clone())], body).into_response())
        }
        Format::Exposition => {
            let body = state.registry.render_exposition();
            Ok(([(header::CONTENT_TYPE, config.exposition_mime_type.clone())], body).into_response())
        }
    }
}
