use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use shared_config::AppConfig;
use shared_models::error::{AppError, ErrorKind};

// ==============================================================================
// SETTINGS
// ==============================================================================

/// How a redirect-checkout confirmation is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutVerification {
    /// Re-fetch the checkout session from the provider before marking paid.
    ServerSide,
    /// Accept the client's success report as-is.
    TrustClient,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub checkout_verification: CheckoutVerification,
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let checkout_verification = if config.stripe_trust_client_confirmation {
            CheckoutVerification::TrustClient
        } else {
            CheckoutVerification::ServerSide
        };

        Self {
            currency: config.currency.clone(),
            checkout_verification,
        }
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            checkout_verification: CheckoutVerification::ServerSide,
        }
    }
}

// ==============================================================================
// PROVIDER MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Attempted,
    Paid,
    #[serde(other)]
    Other,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Created => "created",
            OrderStatus::Attempted => "attempted",
            OrderStatus::Paid => "paid",
            OrderStatus::Other => "other",
        };
        write!(f, "{}", label)
    }
}

/// Order body sent to the order/verify provider.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

/// Order as returned by the order/verify provider. `receipt` carries the
/// appointment id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: OrderStatus,
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub appointment_id: Uuid,
    pub product_name: String,
    pub unit_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl NewCheckoutSession {
    /// Form fields in the provider's bracketed encoding.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), self.appointment_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                self.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                self.unit_amount.to_string(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    pub payment_status: String,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Result of a verify/confirm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid { appointment_id: Uuid, already_paid: bool },
    NotPaid { provider_status: String },
}

impl PaymentOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentOutcome::Paid { .. })
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOrderRequest {
    #[serde(alias = "razorpay_order_id", alias = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
    #[serde(default)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmCheckoutRequest {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
    #[serde(deserialize_with = "bool_or_string")]
    pub success: bool,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

/// Redirect pages echo query parameters back as strings.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => Ok(text.eq_ignore_ascii_case("true")),
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment Cancelled or not found")]
    AppointmentInvalid,

    #[error("Appointment already paid")]
    AlreadyPaid,

    #[error("Unauthorized action")]
    Unauthorized,

    #[error("Payment order not found")]
    OrderNotFound,

    #[error("Checkout session not found")]
    SessionNotFound,

    #[error("Payment reference does not match the appointment")]
    ReceiptMismatch,

    #[error("{0} payments are not configured")]
    ProviderNotConfigured(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(AppointmentError),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::AppointmentNotFound
            | PaymentError::OrderNotFound
            | PaymentError::SessionNotFound => ErrorKind::NotFound,
            PaymentError::AppointmentInvalid | PaymentError::AlreadyPaid => ErrorKind::Conflict,
            PaymentError::Unauthorized => ErrorKind::Unauthorized,
            PaymentError::ReceiptMismatch | PaymentError::ValidationError(_) => ErrorKind::Validation,
            PaymentError::ProviderNotConfigured(_) => ErrorKind::Unavailable,
            PaymentError::Provider(_) => ErrorKind::Provider,
            PaymentError::Store(inner) => inner.kind(),
        }
    }
}

impl From<AppointmentError> for PaymentError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound => PaymentError::AppointmentNotFound,
            AppointmentError::AlreadyCancelled => PaymentError::AppointmentInvalid,
            AppointmentError::Unauthorized => PaymentError::Unauthorized,
            other => PaymentError::Store(other),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(error: reqwest::Error) -> Self {
        PaymentError::Provider(error.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(error: PaymentError) -> Self {
        AppError::from_kind(error.kind(), error.to_string())
    }
}
