//! Payment processor collaborator.
//!
//! The orchestrator talks to the processor only through [`PaymentGateway`].
//! Capture and webhook handling live outside this service; they report back
//! through [`BookingService::record_payment_status`].
//!
//! [`BookingService::record_payment_status`]: crate::booking::BookingService::record_payment_status

pub mod http;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;

use crate::error::AppError;

pub use http::HttpPaymentGateway;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment processor is not configured")]
    NotConfigured,

    #[error("Payment processor unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected payment processor response: {0}")]
    InvalidResponse(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        tracing::error!("Payment processor error: {}", err);
        AppError::Service("Payment processor is unavailable".to_string())
    }
}

/// Request to open a payment intent for a booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Booking id the intent pays for; also the idempotency reference
    pub reference: String,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    /// Full refund when `None`
    pub amount_minor: Option<i64>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError>;

    async fn cancel_intent(&self, payment_intent_id: &str) -> Result<(), PaymentError>;

    async fn refund(&self, request: &RefundRequest) -> Result<Refund, PaymentError>;
}

/// Gateway used when no processor credentials are configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_intent(
        &self,
        _request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::NotConfigured)
    }

    async fn cancel_intent(&self, _payment_intent_id: &str) -> Result<(), PaymentError> {
        Err(PaymentError::NotConfigured)
    }

    async fn refund(&self, _request: &RefundRequest) -> Result<Refund, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}
