// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{patient_id, JsonBody, PathParam};

use crate::models::{BookAppointmentRequest, CancelAppointmentRequest};
use crate::services::booking::AppointmentBookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub booking: Arc<AppointmentBookingService>,
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    JsonBody(request): JsonBody<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    let appointment = state.booking.book_appointment(patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Booked",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    let appointments = state.booking.list_appointments(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    PathParam(appointment_id): PathParam<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(&user)?;

    let appointment = state.booking.get_appointment(patient_id, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    PathParam(appointment_id): PathParam<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    cancel_for_user(&state, &user, appointment_id).await
}

/// Body-addressed cancel used by older web clients.
#[axum::debug_handler]
pub async fn cancel_appointment_by_body(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    JsonBody(request): JsonBody<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    cancel_for_user(&state, &user, request.appointment_id).await
}

async fn cancel_for_user(
    state: &AppointmentState,
    user: &User,
    appointment_id: Uuid,
) -> Result<Json<Value>, AppError> {
    let patient_id = patient_id(user)?;

    let appointment = state.booking.cancel_appointment(patient_id, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment Cancelled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn audit_doctor_ledger(
    State(state): State<AppointmentState>,
    PathParam(doctor_id): PathParam<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role.as_deref() != Some("admin") {
        return Err(AppError::Unauthorized("Only admins can audit slot ledgers".to_string()));
    }

    let audit = state.booking.audit_ledger(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "consistent": audit.is_consistent(),
        "audit": audit
    })))
}
