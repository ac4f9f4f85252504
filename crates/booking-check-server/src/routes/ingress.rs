//! Scraper result ingress.
//!
//! The scraper posts its result document here; the body is forwarded
//! untouched to the scrape result topic, where the fan-out coordinator
//! validates it.

use axum::body::Bytes;
use axum::{extract::State, http::StatusCode, routing::post, Router};

use booking_check_core::SCRAPE_RESULT_TOPIC;

use crate::error::ApiError;
use crate::AppState;

/// Ingress routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/scrapper/result", post(publish_result))
}

async fn publish_result(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .publisher
        .publish(SCRAPE_RESULT_TOPIC, body)
        .await
        .map_err(|e| ApiError::internal("failed to publish scrape result", e))?;

    Ok(StatusCode::ACCEPTED)
}
