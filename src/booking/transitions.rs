//! Booking status transition guard
//!
//! Each resource kind has a forward progression
//! (`pending → confirmed → started → finished`) plus the absorbing
//! `cancelled` status, reachable from any non-terminal status.

use crate::error::AppError;

use super::models::{ActorRole, BookingStatus, ResourceKind};

/// Index in the progression from which a booking counts as underway
const STARTED_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Status '{status}' does not apply to {kind} bookings")]
    UnknownStatus {
        status: BookingStatus,
        kind: &'static str,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::UnknownStatus { .. } => AppError::Validation(err.to_string()),
            TransitionError::Forbidden(msg) => AppError::Authorization(msg),
            TransitionError::Invalid(msg) => AppError::Conflict(msg),
        }
    }
}

fn position(kind: ResourceKind, status: BookingStatus) -> Option<usize> {
    kind.progression().iter().position(|s| *s == status)
}

fn check_vocabulary(kind: ResourceKind, status: BookingStatus) -> Result<(), TransitionError> {
    if status == BookingStatus::Cancelled || position(kind, status).is_some() {
        Ok(())
    } else {
        Err(TransitionError::UnknownStatus {
            status,
            kind: kind.as_str(),
        })
    }
}

/// Whether `status` is the final step of the kind's progression or cancelled
pub fn is_terminal(kind: ResourceKind, status: BookingStatus) -> bool {
    status == BookingStatus::Cancelled
        || position(kind, status) == Some(kind.progression().len() - 1)
}

/// Whether the booking is underway or finished
pub fn is_started(kind: ResourceKind, status: BookingStatus) -> bool {
    position(kind, status).is_some_and(|idx| idx >= STARTED_INDEX)
}

/// Validate a status change requested by `role`.
pub fn check_transition(
    kind: ResourceKind,
    current: BookingStatus,
    requested: BookingStatus,
    role: ActorRole,
) -> Result<(), TransitionError> {
    check_vocabulary(kind, current)?;
    check_vocabulary(kind, requested)?;

    if is_terminal(kind, current) {
        return Err(TransitionError::Invalid(format!(
            "Booking is already {}",
            current
        )));
    }
    if current == requested {
        return Err(TransitionError::Invalid(format!(
            "Booking is already {}",
            current
        )));
    }

    let current_idx = position(kind, current).unwrap_or(0);

    match role {
        ActorRole::Requester => {
            if requested != BookingStatus::Cancelled {
                return Err(TransitionError::Forbidden(
                    "Requesters may only cancel their bookings".to_string(),
                ));
            }
            if is_started(kind, current) {
                return Err(TransitionError::Invalid(format!(
                    "Cannot cancel a booking that is {}",
                    current
                )));
            }
            Ok(())
        }
        ActorRole::Owner => {
            if requested == BookingStatus::Cancelled {
                return Err(TransitionError::Forbidden(
                    "Owners cannot cancel bookings on the requester's behalf".to_string(),
                ));
            }
            let next = kind.progression()[current_idx + 1];
            if requested != next {
                return Err(TransitionError::Invalid(format!(
                    "A {} booking can only advance to {}",
                    current, next
                )));
            }
            Ok(())
        }
        ActorRole::Administrator => {
            if requested == BookingStatus::Cancelled {
                return Ok(());
            }
            match position(kind, requested) {
                Some(idx) if idx > current_idx => Ok(()),
                _ => Err(TransitionError::Invalid(format!(
                    "Status cannot move back from {} to {}",
                    current, requested
                ))),
            }
        }
    }
}

pub fn can_transition(
    kind: ResourceKind,
    current: BookingStatus,
    requested: BookingStatus,
    role: ActorRole,
) -> bool {
    check_transition(kind, current, requested, role).is_ok()
}
