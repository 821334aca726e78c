//! Availability, pricing and booking orchestration service.
//!
//! Rooms, rental vehicles, tour departures and transfers are all modelled as
//! resources with a capacity and a pricing table. The service checks
//! availability against existing bookings, prices the request, opens a
//! payment intent and persists the booking without ever exceeding capacity.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod booking;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod payments;
pub mod pricing;

use booking::routes::{USER_ID_HEADER, USER_ROLE_HEADER};
use booking::BookingService;
use cache::{AppCache, CacheStats};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub cache: AppCache,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache: CacheStats,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache: state.cache.stats(),
    })
}

/// Build the application router
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .nest("/api/pricing", pricing::router())
        .nest("/api", booking::router())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
