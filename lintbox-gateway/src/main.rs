//! Entry point for the `lintbox-gateway` HTTP server.

use lintbox_gateway::{routes::create_router, service::Playground, settings::Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "invalid settings");
            std::process::exit(1);
        }
    };
    let baseline = match settings.load_baseline() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "invalid baseline configuration");
            std::process::exit(1);
        }
    };

    let playground = Playground::from_settings(&settings, baseline);

    let store = playground.store();
    let mut purge = tokio::time::interval(settings.purge_interval);
    tokio::spawn(async move {
        loop {
            purge.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired shares purged"),
                Err(e) => tracing::warn!(error = %e, "share purge failed"),
            }
        }
    });

    let app = create_router(playground, &settings.api_prefix, &settings.cors_origins);

    let listener = match tokio::net::TcpListener::bind(&settings.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %settings.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(
        addr = %settings.listen_addr,
        prefix = %settings.api_prefix,
        share_ttl_secs = settings.share_ttl.as_secs(),
        "lintbox-gateway listening"
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
