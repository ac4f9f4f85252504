//! Booking availability notifier.
//!
//! Wires the subscriber registry, the in-process broker and the Telegram
//! bot together, and serves the HTTP surface: subscriber listing, health
//! and the scraper result ingress.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod telegram;

pub use config::{Args, ServerConfig};
pub use error::{ApiError, Error};
pub use service::NotifierService;

use std::sync::Arc;

use axum::Router;
use booking_check_core::{Publisher, SharedRegistry};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Subscriber registry.
    pub registry: SharedRegistry,
    /// Broker the ingress publishes scrape results to.
    pub publisher: Arc<dyn Publisher>,
}

impl AppState {
    /// Create new application state.
    pub fn new(registry: SharedRegistry, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            registry,
            publisher,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::routes())
        .merge(routes::subscriptions::routes())
        .merge(routes::ingress::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
