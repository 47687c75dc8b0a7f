// Service entry: configuration, tracing, state wiring, and the HTTP server.
use anyhow::Result;
use parley_server::api;
use parley_server::config::{self, Config};
use parley_server::runtime::HttpAgentRuntime;
use parley_server::shutdown::shutdown_signal;
use parley_server::state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    init_tracing(&config);

    let runtime = Arc::new(HttpAgentRuntime::new(&config.runtime.base_url)?);
    let state = Arc::new(AppState::new(config.clone(), runtime)?);

    let app = api::build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("agent chat service listening on http://{addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        warn!("server exited abnormally: {err}");
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
