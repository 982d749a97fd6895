use std::sync::Arc;

use axum::{middleware as axum_mw, routing::get, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

use crate::config::{MetricsConfig, MetricsOptions};
use crate::error::Result;
use crate::handlers::metrics::{get_metrics, EndpointState};
use crate::metrics::{CollectorRegistry, CollectorSet, RequestDurationHistogram};
use crate::middleware::{require_auth, timing_middleware, RequestTimer};
use crate::sampler::ProcessSampler;

/// The metrics plugin: validated configuration plus the shared registry,
/// sampler and request histogram.
///
/// ```no_run
/// # async fn demo() -> Result<(), metri::MetricsError> {
/// use axum::{routing::get, Router};
/// use metri::{MetricsOptions, MetricsPlugin};
///
/// let plugin = MetricsPlugin::register(MetricsOptions::default())?;
/// let app: Router = plugin.attach(Router::new().route("/", get(|| async { "ok" })));
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
pub struct MetricsPlugin {
    config: Arc<MetricsConfig>,
    sampler: Arc<ProcessSampler>,
    registry: Arc<CollectorRegistry>,
    request_duration: Arc<RequestDurationHistogram>,
    timer: Arc<RequestTimer>,
}

impl MetricsPlugin {
    /// Validates `options` and builds the collectors. Any error here means
    /// the host should refuse to start.
    pub fn register(options: MetricsOptions) -> Result<Self> {
        let config = MetricsConfig::resolve(options)?;
        let sampler = Arc::new(ProcessSampler::new());

        let CollectorSet {
            registry,
            request_duration,
        } = match &config.setup_collectors {
            Some(setup) => setup(&sampler)?,
            None => CollectorSet::standard(&sampler)?,
        };

        info!(
            path = %config.path,
            default_format = ?config.default_format,
            collectors = ?registry.names(),
            auth = config.auth.is_some(),
            "metrics plugin registered"
        );

        let timer = Arc::new(RequestTimer::new(
            Arc::clone(&request_duration),
            Arc::clone(&sampler),
            config.format_paths.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            sampler,
            registry: Arc::new(registry),
            request_duration,
            timer,
        })
    }

    /// Adds the metrics route to `router` and times every route on it.
    ///
    /// Call this after the host's own routes are defined: the timing layer
    /// only wraps routes that already exist. Handler panics become `500`
    /// responses and are recorded with that status.
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = Arc::new(EndpointState {
            config: Arc::clone(&self.config),
            sampler: Arc::clone(&self.sampler),
            registry: Arc::clone(&self.registry),
        });

        let mut endpoint: Router<S> = Router::new()
            .route(&self.config.path, get(get_metrics))
            .with_state(state);
        if let Some(check) = &self.config.auth {
            endpoint = endpoint.route_layer(axum_mw::from_fn_with_state(Arc::clone(check), require_auth));
        }

        router
            .merge(endpoint)
            .layer(CatchPanicLayer::new())
            .layer(axum_mw::from_fn_with_state(Arc::clone(&self.timer), timing_middleware))
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn sampler(&self) -> &Arc<ProcessSampler> {
        &self.sampler
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    pub fn request_duration(&self) -> &Arc<RequestDurationHistogram> {
        &self.request_duration
    }
}
