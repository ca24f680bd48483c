// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::Origin;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{patient_id, JsonBody};

use crate::models::{
    ConfirmCheckoutRequest, CreateCheckoutRequest, CreateOrderRequest, PaymentError,
    PaymentOutcome, VerifyOrderRequest,
};
use crate::services::reconciler::PaymentReconciler;

#[derive(Clone)]
pub struct PaymentState {
    pub reconciler: Arc<PaymentReconciler>,
}

fn outcome_response(outcome: PaymentOutcome) -> Json<Value> {
    let (success, message) = if outcome.is_paid() {
        (true, "Payment Successful")
    } else {
        (false, "Payment Failed")
    };

    Json(json!({
        "success": success,
        "message": message,
        "outcome": outcome
    }))
}

fn origin_string(origin: &Origin) -> Option<String> {
    if origin.is_null() {
        return None;
    }

    Some(match origin.port() {
        Some(port) => format!("{}://{}:{}", origin.scheme(), origin.hostname(), port),
        None => format!("{}://{}", origin.scheme(), origin.hostname()),
    })
}

// ==============================================================================
// ORDER FLOW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_razorpay_order(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    JsonBody(request): JsonBody<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    state
        .reconciler
        .owned_appointment(patient_id, request.appointment_id)
        .await?;

    let order = state.reconciler.create_order(request.appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "order": order
    })))
}

#[axum::debug_handler]
pub async fn verify_razorpay_payment(
    State(state): State<PaymentState>,
    JsonBody(request): JsonBody<VerifyOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.reconciler.verify_order(&request.order_id).await?;
    Ok(outcome_response(outcome))
}

// ==============================================================================
// CHECKOUT FLOW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_stripe_session(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    origin: Option<TypedHeader<Origin>>,
    JsonBody(request): JsonBody<CreateCheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    // Browsers send Origin; API clients may pass it in the body instead.
    let origin = origin
        .and_then(|TypedHeader(origin)| origin_string(&origin))
        .or(request.origin)
        .ok_or_else(|| PaymentError::ValidationError("Return origin is required".to_string()))?;

    state
        .reconciler
        .owned_appointment(patient_id, request.appointment_id)
        .await?;

    let session = state
        .reconciler
        .create_checkout_session(request.appointment_id, &origin)
        .await?;

    Ok(Json(json!({
        "success": true,
        "session_id": session.id,
        "session_url": session.url
    })))
}

#[axum::debug_handler]
pub async fn confirm_stripe_payment(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    JsonBody(request): JsonBody<ConfirmCheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    state
        .reconciler
        .owned_appointment(patient_id, request.appointment_id)
        .await?;

    let outcome = state
        .reconciler
        .confirm_checkout(
            request.appointment_id,
            request.success,
            request.session_id.as_deref(),
        )
        .await?;

    Ok(outcome_response(outcome))
}
