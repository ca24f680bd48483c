use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
    pub stripe_secret_key: String,
    pub stripe_base_url: String,
    pub currency: String,
    pub stripe_trust_client_confirmation: bool,
    /// JSON file of doctors and patients loaded into the in-memory store.
    pub in_memory_seed_file: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID")
                .unwrap_or_else(|_| {
                    warn!("RAZORPAY_KEY_ID not set, using empty value");
                    String::new()
                }),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET")
                .unwrap_or_else(|_| {
                    warn!("RAZORPAY_KEY_SECRET not set, using empty value");
                    String::new()
                }),
            razorpay_base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_SECRET_KEY not set, using empty value");
                    String::new()
                }),
            stripe_base_url: env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            currency: env::var("CURRENCY")
                .unwrap_or_else(|_| {
                    warn!("CURRENCY not set, using default");
                    "INR".to_string()
                }),
            stripe_trust_client_confirmation: env::var("STRIPE_TRUST_CLIENT_CONFIRMATION")
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
            in_memory_seed_file: env::var("IN_MEMORY_SEED_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.stripe_trust_client_confirmation {
            warn!("STRIPE_TRUST_CLIENT_CONFIRMATION enabled: checkout outcomes are taken from the client without provider re-verification");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_razorpay_configured(&self) -> bool {
        !self.razorpay_key_id.is_empty()
            && !self.razorpay_key_secret.is_empty()
            && !self.razorpay_base_url.is_empty()
    }

    pub fn is_stripe_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty() && !self.stripe_base_url.is_empty()
    }

    /// Key sent as bearer token for store-side writes. Falls back to the anon key.
    pub fn supabase_write_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
