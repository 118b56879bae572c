pub mod bookings;
pub mod calendar;
pub mod catalog;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Public booking API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/public/services", get(catalog::list_services))
        .route("/api/public/bookings", post(bookings::create_booking))
        .route(
            "/api/public/bookings/availability",
            get(bookings::availability),
        )
        .route(
            "/api/public/bookings/:ref_number/ics",
            get(calendar::download_ics),
        )
        .with_state(state)
}
