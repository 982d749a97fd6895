use axum::{extract::Path, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use metri::MetricsPlugin;

/// Builds the demo host: a few plain routes, instrumented by the plugin.
pub fn create_router(plugin: &MetricsPlugin) -> Router {
    let host = Router::new()
        .route("/", get(|| async { "metri demo: try GET /metrics" }))
        .route("/hello/:name", get(hello))
        // Panics are turned into 500s and still show up in the histogram.
        .route("/fail", get(fail));

    plugin
        .attach(host)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn hello(Path(name): Path<String>) -> String {
    format!("hello, {name}")
}

async fn fail() -> &'static str {
    panic!("demo failure")
}
