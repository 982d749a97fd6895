use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use metri::{bearer_token, MetricsPlugin};

mod server;
mod settings;

use settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── 1. Load settings ─────────────────────────────────────────
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("METRI_CONFIG").map(PathBuf::from));
    let mut settings = match Settings::load(settings_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "cannot load settings");
            return ExitCode::FAILURE;
        }
    };
    if let Some(token) = settings.auth_token.take() {
        settings.metrics.auth = Some(bearer_token(token));
    }

    // ── 2. Register the plugin ───────────────────────────────────
    let plugin = match MetricsPlugin::register(settings.metrics) {
        Ok(plugin) => plugin,
        Err(e) => {
            error!(error = %e, "metrics plugin setup failed");
            return ExitCode::FAILURE;
        }
    };

    // ── 3. Build router, bind & serve ────────────────────────────
    let app = server::create_router(&plugin);
    let listener = match tokio::net::TcpListener::bind(&settings.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %settings.listen, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %settings.listen, metrics = %plugin.config().path, "server listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
