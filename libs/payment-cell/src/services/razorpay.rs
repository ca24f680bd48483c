// libs/payment-cell/src/services/razorpay.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{NewOrder, PaymentError, PaymentOrder};
use crate::services::gateway::{validate_provider_id, OrderGateway};

/// Razorpay Orders API client.
/// Based on: https://razorpay.com/docs/api/orders/
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    base_url: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RazorpayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_razorpay_configured() {
            return Err(PaymentError::ProviderNotConfigured("Razorpay".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
            base_url: config.razorpay_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Maps a non-success response to a payment error, keeping the provider's description.
    fn api_error(status: StatusCode, body: &str) -> PaymentError {
        let detail = serde_json::from_str::<RazorpayErrorBody>(body)
            .ok()
            .map(|parsed| {
                format!(
                    "{}: {}",
                    parsed.error.code.unwrap_or_else(|| "ERROR".to_string()),
                    parsed.error.description.unwrap_or_default()
                )
            })
            .unwrap_or_else(|| body.to_string());

        PaymentError::Provider(format!("HTTP {}: {}", status, detail))
    }
}

#[async_trait]
impl OrderGateway for RazorpayClient {
    /// POST /orders
    async fn create_order(&self, order: &NewOrder) -> Result<PaymentOrder, PaymentError> {
        info!("Creating Razorpay order for receipt {}", order.receipt);

        let url = format!("{}/orders", self.base_url);
        debug!("Sending order creation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(order)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Razorpay order creation response: {} - {}", status, response_text);

        if !status.is_success() {
            error!("Razorpay order creation failed: {} - {}", status, response_text);
            return Err(Self::api_error(status, &response_text));
        }

        let created: PaymentOrder = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Provider(format!("Failed to parse order response: {}", e)))?;

        info!("Created Razorpay order {} for receipt {}", created.id, order.receipt);
        Ok(created)
    }

    /// GET /orders/{id}
    async fn fetch_order(&self, order_id: &str) -> Result<PaymentOrder, PaymentError> {
        let order_id = validate_provider_id("Order id", order_id)?;
        debug!("Fetching Razorpay order {}", order_id);

        let url = format!("{}/orders/{}", self.base_url, order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(PaymentError::OrderNotFound);
        }

        if !status.is_success() {
            error!("Razorpay order fetch failed: {} - {}", status, response_text);
            return Err(Self::api_error(status, &response_text));
        }

        serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::Provider(format!("Failed to parse order response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_uses_provider_description() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"amount exceeds maximum"}}"#;
        let error = RazorpayClient::api_error(StatusCode::BAD_REQUEST, body);

        assert_eq!(
            error,
            PaymentError::Provider("HTTP 400 Bad Request: BAD_REQUEST_ERROR: amount exceeds maximum".to_string())
        );
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        let error = RazorpayClient::api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            error,
            PaymentError::Provider("HTTP 502 Bad Gateway: upstream down".to_string())
        );
    }
}
