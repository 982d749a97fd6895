use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use crate::config::FormatPaths;
use crate::metrics::{RequestDurationHistogram, RequestLabels};
use crate::sampler::ProcessSampler;

/// `path` label for requests no route matched. Raw URIs never become labels
/// unless `format_paths` makes them so.
pub const UNMATCHED_PATH: &str = "<unmatched>";

/// Feeds every completed request into the duration histogram.
pub struct RequestTimer {
    histogram: Arc<RequestDurationHistogram>,
    sampler: Arc<ProcessSampler>,
    format_paths: Option<FormatPaths>,
}

impl RequestTimer {
    pub fn new(
        histogram: Arc<RequestDurationHistogram>,
        sampler: Arc<ProcessSampler>,
        format_paths: Option<FormatPaths>,
    ) -> Self {
        Self {
            histogram,
            sampler,
            format_paths,
        }
    }

    /// The `path` label for a request, or `None` to skip it.
    ///
    /// Without a `format_paths` hook this is the matched route template, or
    /// `UNMATCHED_PATH` for unrouted requests.
    pub fn path_label(&self, req: &Request) -> Option<String> {
        if let Some(format_paths) = &self.format_paths {
            return format_paths(req);
        }
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map_or(UNMATCHED_PATH, |m| m.as_str())
            .to_owned();
        Some(path)
    }

    /// Records one completed request.
    pub fn record(&self, elapsed: Duration, method: &Method, path: Option<String>, status: StatusCode) {
        let Some(path) = path else {
            debug!(%method, %status, "path label skipped, request not observed");
            return;
        };
        let ms = elapsed.as_secs_f64() * 1000.0;
        trace!(%method, %path, %status, ms, "request observed");
        self.histogram
            .observe(ms, RequestLabels::new(method.as_str(), path, status.as_u16()));
    }
}

/// Middleware wrapping every route of the host router.
///
/// The response passes through untouched. A request whose future is dropped
/// before the inner service answers is never recorded.
pub async fn timing_middleware(State(timer): State<Arc<RequestTimer>>, req: Request, next: Next) -> Response {
    let _in_flight = timer.sampler.track_request();
    let method = req.method().clone();
    let path = timer.path_label(&req);

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    timer.record(elapsed, &method, path, response.status());
    response
}
