//! Booking route handlers

use std::str::FromStr;

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::AppState;

use super::models::{Actor, BookingStatus, PaymentStatus};
use super::requests::{
    AvailabilityQuery, CreateBookingRequest, PaymentStatusRequest, UpdateStatusRequest,
};
use super::responses::{AvailabilityResponse, BookingResponse};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's role; `admin` marks administrators
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|role| role.trim().eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        Ok(Actor {
            user_id: user_id.to_string(),
            is_admin,
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resources/:id/availability", get(availability))
        .route("/bookings", post(create_booking))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/status", post(update_status))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/payments/:payment_intent_id/status", post(record_payment))
}

/// Availability of a resource for a date range
pub async fn availability(
    State(state): State<AppState>,
    AppPath(resource_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>> {
    query.validate()?;

    let (range, availability) = state
        .bookings
        .check_availability(
            resource_id,
            query.start_date,
            query.end_date,
            &query.occupancy(),
        )
        .await?;

    Ok(Json(AvailabilityResponse::new(resource_id, range, availability)))
}

/// Create a pending booking for the calling user
pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(request): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>)> {
    request.validate()?;

    let booking = state
        .bookings
        .create_booking(request.into_request(actor.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<BookingResponse>> {
    let booking = state.bookings.get_booking(&actor, id).await?;
    Ok(Json(booking.into()))
}

pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>> {
    request.validate()?;
    let requested = BookingStatus::from_str(request.status.trim())?;

    let booking = state.bookings.update_status(&actor, id, requested).await?;
    Ok(Json(booking.into()))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<BookingResponse>> {
    let booking = state.bookings.cancel_booking(&actor, id).await?;
    Ok(Json(booking.into()))
}

/// Payment outcome relayed by the processor webhook layer
pub async fn record_payment(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(payment_intent_id): AppPath<String>,
    AppJson(request): AppJson<PaymentStatusRequest>,
) -> Result<Json<BookingResponse>> {
    if !actor.is_admin {
        return Err(AppError::forbidden(
            "Only administrators may report payment outcomes",
        ));
    }
    request.validate()?;
    let status = PaymentStatus::from_str(request.status.trim())?;

    let booking = state
        .bookings
        .record_payment_status(&payment_intent_id, status)
        .await?;
    Ok(Json(booking.into()))
}
