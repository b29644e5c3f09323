use std::sync::Arc;

use tracing::info;

use vetai_backend::config::Config;
use vetai_backend::provider::OpenAiClient;
use vetai_backend::routes::build_router;
use vetai_backend::service::relay_service::RelayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vetai_backend=debug,tower_http=debug".into()),
        )
        .init();

    // ── Configuration & dependency wiring ────────────────────────────────────
    let config = Arc::new(Config::from_env());
    let backend = OpenAiClient::new(&config);
    let service = RelayService::new(config.clone(), backend);

    // ── Router ────────────────────────────────────────────────────────────────
    let app = build_router(service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
