//! Stripe-style REST payment gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::{
    PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest, Refund, RefundRequest,
};

#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundBody {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the processor's error message, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

impl HttpPaymentGateway {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self, PaymentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<Response, PaymentError> {
        let mut request = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Rejected {
            status,
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let form = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("description", request.description.clone()),
            ("metadata[booking_id]", request.reference.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let key = format!("intent-{}", request.reference);

        let body: IntentBody = self
            .post_form("/v1/payment_intents", &form, Some(&key))
            .await?
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        debug!("Created payment intent {} ({})", body.id, body.status);
        Ok(PaymentIntent {
            id: body.id,
            status: body.status,
            client_secret: body.client_secret,
        })
    }

    async fn cancel_intent(&self, payment_intent_id: &str) -> Result<(), PaymentError> {
        let path = format!("/v1/payment_intents/{}/cancel", payment_intent_id);
        self.post_form(&path, &[], None).await?;
        Ok(())
    }

    async fn refund(&self, request: &RefundRequest) -> Result<Refund, PaymentError> {
        let mut form = vec![("payment_intent", request.payment_intent_id.clone())];
        if let Some(amount) = request.amount_minor {
            form.push(("amount", amount.to_string()));
        }

        let body: RefundBody = self
            .post_form("/v1/refunds", &form, Some(&request.idempotency_key))
            .await?
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(Refund {
            id: body.id,
            status: body.status,
        })
    }
}
