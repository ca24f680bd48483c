use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use appointment_cell::services::AppointmentBookingService;
use payment_cell::payment_routes;
use payment_cell::services::PaymentReconciler;
use shared_config::AppConfig;

pub fn create_router(
    state: Arc<AppConfig>,
    booking: Arc<AppointmentBookingService>,
    reconciler: Arc<PaymentReconciler>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/appointments", appointment_routes(state.clone(), booking))
        .nest("/payments", payment_routes(state, reconciler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    use appointment_cell::services::InMemoryAppointmentStore;
    use payment_cell::models::PaymentSettings;
    use shared_utils::test_utils::TestConfig;

    fn test_router() -> Router {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let booking = Arc::new(AppointmentBookingService::new(store.clone()));
        let reconciler = Arc::new(PaymentReconciler::new(store, PaymentSettings::default()));
        create_router(TestConfig::default().to_arc(), booking, reconciler)
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cells_are_mounted_behind_auth() {
        for uri in ["/appointments", "/payments/razorpay/verify"] {
            let method = if uri == "/appointments" { "GET" } else { "POST" };
            let response = test_router()
                .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
