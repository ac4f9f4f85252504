//! Subscriber listing endpoint.

use axum::{extract::State, routing::get, Json, Router};

use booking_check_core::{run_blocking, RecipientId};

use crate::error::ApiError;
use crate::AppState;

/// Subscription routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/subs", get(list_subscribers))
}

/// Current subscriber IDs as a JSON array.
async fn list_subscribers(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecipientId>>, ApiError> {
    let subscribers = run_blocking(&state.registry, |registry| registry.subscribers())
        .await
        .map_err(|e| ApiError::internal("failed to read subscribers", e))?;

    Ok(Json(subscribers))
}
