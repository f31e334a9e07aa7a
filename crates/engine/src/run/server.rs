use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ipgeo_engine::api;
use ipgeo_engine::infrastructure::config::AppConfig;
use ipgeo_engine::infrastructure::queue_workers::{batch_worker, cache_cleanup_worker};

use crate::composition::new_app;

/// Spawns a task that cancels the token on SIGTERM/SIGINT
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origins = &config.cors_allowed_origins;
    if origins.is_empty() {
        return None;
    }

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured to allow ANY origin - this is insecure for production!");
        return Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    tracing::info!("CORS configured for origins: {:?}", origins);
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

pub async fn run() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipgeo_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting IP geolocation engine");

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Provider: {}", config.provider.base_url);
    tracing::info!("  Store: {:?}", config.store.backend);
    tracing::info!(
        "  Cache TTL: {}h, sweep every {}h",
        config.cache.ttl_hours,
        config.cache.cleanup_interval_hours
    );

    let (app, receiver) = new_app(&config).await?;
    let app = Arc::new(app);
    tracing::info!("Application state initialized");

    if config.cache.seed_on_startup {
        if let Err(e) = app.use_cases.cache.seed.execute().await {
            tracing::warn!(error = %e, "Failed to seed geo cache");
        }
    }

    let batch_worker_task = {
        let process = app.use_cases.batch.process.clone();
        let cancel = cancel_token.clone();
        tokio::spawn(batch_worker(receiver, process, cancel))
    };

    let cleanup_worker_task = {
        let sweep = app.use_cases.cache.sweep.clone();
        let interval =
            std::time::Duration::from_secs(config.cache.cleanup_interval_hours.max(1) * 3600);
        let cancel = cancel_token.clone();
        tokio::spawn(cache_cleanup_worker(sweep, interval, cancel))
    };

    let mut router = Router::new()
        .merge(api::create_routes())
        .layer(TraceLayer::new_for_http());
    if let Some(cors) = cors_layer(&config) {
        router = router.layer(cors);
    }
    let router = router.with_state(app.clone());

    let host: std::net::IpAddr = config
        .server_host
        .parse()
        .map_err(|e| anyhow::anyhow!("SERVER_HOST '{}' is not an IP address: {e}", config.server_host))?;
    let addr = SocketAddr::from((host, config.server_port));
    tracing::info!("Listening on {}", addr);

    let server = axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown({
            let cancel_token = cancel_token.clone();
            async move {
                cancel_token.cancelled().await;
                tracing::info!("HTTP server received shutdown signal");
            }
        });

    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }

    // The server can also stop on its own; make sure the workers see it.
    cancel_token.cancel();
    tracing::info!("Waiting for workers to complete...");

    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        let _ = batch_worker_task.await;
        let _ = cleanup_worker_task.await;
    })
    .await;

    tracing::info!("IP geolocation engine shutdown complete");
    Ok(())
}
