pub mod api_routes;
pub mod chart_routes;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::provider::ChatBackend;
use crate::service::relay_service::RelayService;

/// GET `/` — plain-text liveness probe
pub async fn index_handler() -> &'static str {
    "VetAI is running!"
}

pub fn build_router<B: ChatBackend>(service: RelayService<B>) -> Router {
    let cors = cors_layer(service.config());
    Router::new()
        .route("/", get(index_handler))
        .route("/api/chat", post(api_routes::chat_handler::<B>))
        .route("/api/chat/stream", post(api_routes::chat_stream_handler::<B>))
        .route("/generate-chart", post(chart_routes::generate_chart_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
