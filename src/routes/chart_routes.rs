use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use crate::chart::{render_bar_chart, ChartRequest};
use crate::errors::AppError;

/// POST `/generate-chart` — renders `values` pairs as an SVG bar chart.
pub async fn generate_chart_handler(
    Json(request): Json<ChartRequest>,
) -> Result<Response, AppError> {
    let values = request.values.ok_or(AppError::MissingValues)?;
    info!(points = values.len(), "chart request received");
    let svg = render_bar_chart(&values);
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}
