// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, PaymentState};
use crate::services::reconciler::PaymentReconciler;

pub fn payment_routes(config: Arc<AppConfig>, reconciler: Arc<PaymentReconciler>) -> Router {
    let state = PaymentState { reconciler };

    Router::new()
        .route("/razorpay/orders", post(handlers::create_razorpay_order))
        .route("/razorpay/verify", post(handlers::verify_razorpay_payment))
        .route("/stripe/sessions", post(handlers::create_stripe_session))
        .route("/stripe/confirm", post(handlers::confirm_stripe_payment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
