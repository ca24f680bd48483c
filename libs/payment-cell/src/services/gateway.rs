use async_trait::async_trait;

use crate::models::{CheckoutSession, NewCheckoutSession, NewOrder, PaymentError, PaymentOrder};

/// Order/verify provider: an order is created up front and its status polled.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(&self, order: &NewOrder) -> Result<PaymentOrder, PaymentError>;

    async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError>;
}

/// Redirect-checkout provider: a hosted session the patient is sent to.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, session: &NewCheckoutSession) -> Result<CheckoutSession, PaymentError>;

    async fn fetch_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError>;
}

/// Rejects provider object ids that are empty or carry anything other than
/// ASCII alphanumerics and `_`. Ids are placed in request paths.
pub fn validate_provider_id<'a>(label: &str, id: &'a str) -> Result<&'a str, PaymentError> {
    if id.is_empty() {
        return Err(PaymentError::ValidationError(format!("{} is required", label)));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PaymentError::ValidationError(format!("{} is malformed", label)));
    }

    Ok(id)
}
