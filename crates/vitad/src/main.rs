use std::time::Duration;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vitad::config::Config;
use vitad::http_api::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitad=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        bind_addr = %config.bind_addr,
        liveness_ttl_secs = config.liveness_ttl_secs,
        doc_ttl_secs = config.doc_ttl_secs,
        callback_required = config.callback_required,
        callback_path = %config.callback_path,
        "vitad starting"
    );

    let state = AppState::new(&config);
    let app = create_router(state.clone(), &config.callback_path)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Expiry sweep. Lookups also check TTL lazily, this just bounds
    // memory between requests.
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweeper.sweep().await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("vitad shutting down");
        })
        .await?;

    Ok(())
}
