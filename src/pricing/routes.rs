//! Pricing route handlers

use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::error::Result;
use crate::extract::AppJson;
use crate::AppState;

use super::requests::QuoteRequest;
use super::responses::QuoteResponse;

pub fn router() -> Router<AppState> {
    Router::new().route("/quote", post(quote))
}

/// Price a prospective booking without reserving anything
pub async fn quote(
    State(state): State<AppState>,
    AppJson(request): AppJson<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    request.validate()?;

    let quote = state
        .bookings
        .quote(
            request.resource_id,
            request.start_date,
            request.end_date,
            &request.occupancy(),
        )
        .await?;

    Ok(Json(quote.into()))
}
