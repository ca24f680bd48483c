// libs/payment-cell/src/services/stripe.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CheckoutSession, NewCheckoutSession, PaymentError};
use crate::services::gateway::{validate_provider_id, CheckoutGateway};

/// Stripe Checkout Sessions client.
/// Based on: https://docs.stripe.com/api/checkout/sessions
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_stripe_configured() {
            return Err(PaymentError::ProviderNotConfigured("Stripe".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            base_url: config.stripe_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_error(status: StatusCode, body: &str) -> PaymentError {
        let detail = serde_json::from_str::<StripeErrorBody>(body)
            .ok()
            .map(|parsed| {
                format!(
                    "{}: {}",
                    parsed.error.error_type.unwrap_or_else(|| "api_error".to_string()),
                    parsed.error.message.unwrap_or_default()
                )
            })
            .unwrap_or_else(|| body.to_string());

        PaymentError::Provider(format!("HTTP {}: {}", status, detail))
    }
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    /// POST /checkout/sessions
    async fn create_session(&self, session: &NewCheckoutSession) -> Result<CheckoutSession, PaymentError> {
        info!("Creating Stripe checkout session for appointment {}", session.appointment_id);

        let url = format!("{}/checkout/sessions", self.base_url);
        debug!("Sending checkout session request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&session.form_fields())
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Stripe checkout session response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Stripe checkout session creation failed: {} - {}", status, response_text);
            return Err(Self::api_error(status, &response_text));
        }

        let created: CheckoutSession = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Provider(format!("Failed to parse session response: {}", e)))?;

        info!("Created Stripe checkout session {}", created.id);
        Ok(created)
    }

    /// GET /checkout/sessions/{id}
    async fn fetch_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        let session_id = validate_provider_id("Session id", session_id)?;
        debug!("Fetching Stripe checkout session {}", session_id);

        let url = format!("{}/checkout/sessions/{}", self.base_url, session_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::SessionNotFound);
        }

        if !status.is_success() {
            error!("Stripe checkout session fetch failed: {} - {}", status, response_text);
            return Err(Self::api_error(status, &response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Provider(format!("Failed to parse session response: {}", e)))
    }
}
