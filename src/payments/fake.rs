//! Recording gateway for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    PaymentError, PaymentGateway, PaymentIntent, PaymentIntentRequest, Refund, RefundRequest,
};

#[derive(Debug, Default)]
pub struct FakeGateway {
    pub intents_created: AtomicUsize,
    pub intents_cancelled: AtomicUsize,
    pub refunds_issued: AtomicUsize,
    pub fail_intents: AtomicBool,
    pub fail_refunds: AtomicBool,
    /// Sleep this long inside `create_intent` and `refund`
    pub delay: Option<Duration>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail_intents.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.intents_cancelled.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> usize {
        self.refunds_issued.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        self.pause().await;
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 500,
                message: "processor down".to_string(),
            });
        }
        let n = self.intents_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_{}_{}", n, request.reference),
            status: "requires_payment_method".to_string(),
            client_secret: Some(format!("secret_{}", n)),
        })
    }

    async fn cancel_intent(&self, _payment_intent_id: &str) -> Result<(), PaymentError> {
        self.intents_cancelled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refund(&self, request: &RefundRequest) -> Result<Refund, PaymentError> {
        self.pause().await;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                status: 402,
                message: "refund declined".to_string(),
            });
        }
        let n = self.refunds_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Refund {
            id: format!("re_{}_{}", n, request.payment_intent_id),
            status: "succeeded".to_string(),
        })
    }
}
