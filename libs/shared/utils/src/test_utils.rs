use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub razorpay_base_url: String,
    pub stripe_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            razorpay_base_url: "http://localhost:9101/v1".to_string(),
            stripe_base_url: "http://localhost:9102/v1".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            razorpay_key_id: "rzp_test_key".to_string(),
            razorpay_key_secret: "rzp_test_secret".to_string(),
            razorpay_base_url: self.razorpay_base_url.clone(),
            stripe_secret_key: "sk_test_key".to_string(),
            stripe_base_url: self.stripe_base_url.clone(),
            currency: "INR".to_string(),
            stripe_trust_client_confirmation: false,
            in_memory_seed_file: None,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    /// Patient whose token subject is a known id.
    pub fn with_id(id: Uuid, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: "patient".to_string(),
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes returned by the Supabase REST API for the booking tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(doctor_id: &str, fees: i64, available: bool, slots_booked: serde_json::Value) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "name": "Dr. Richard James",
            "email": "richard@example.com",
            "speciality": "General physician",
            "degree": "MBBS",
            "experience": "4 Years",
            "about": "Focused on preventive care.",
            "image": null,
            "address": { "line1": "17th Cross, Richmond", "line2": "Circle, Ring Road, London" },
            "available": available,
            "fees": fees,
            "slots_booked": slots_booked
        })
    }

    pub fn patient_row(patient_id: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "name": "Test Patient",
            "email": "patient@example.com",
            "phone": "0000000000",
            "image": null,
            "address": { "line1": "", "line2": "" },
            "gender": "Not Selected",
            "dob": "Not Selected"
        })
    }

    pub fn appointment_row(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        cancelled: bool,
        payment: bool,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "slot_date": "2024-05-01",
            "slot_time": "10:00",
            "patient_data": Self::patient_row(patient_id),
            "doctor_data": {
                "id": doctor_id,
                "name": "Dr. Richard James",
                "email": "richard@example.com",
                "speciality": "General physician",
                "degree": "MBBS",
                "experience": "4 Years",
                "about": "Focused on preventive care.",
                "image": null,
                "address": {},
                "fees": 500
            },
            "amount": 500,
            "created_at": "2024-04-20T09:30:00Z",
            "cancelled": cancelled,
            "payment": payment
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_razorpay_configured());
        assert!(app_config.is_stripe_configured());
    }

    #[test]
    fn test_user_creation() {
        let id = Uuid::new_v4();
        let user = TestUser::with_id(id, "patient@example.com");

        let user_model = user.to_user();
        assert_eq!(user_model.patient_id(), Some(id));
        assert_eq!(user_model.role.as_deref(), Some("patient"));
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
