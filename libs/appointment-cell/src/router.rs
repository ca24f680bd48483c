// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};
use crate::services::booking::AppointmentBookingService;

pub fn appointment_routes(config: Arc<AppConfig>, booking: Arc<AppointmentBookingService>) -> Router {
    let state = AppointmentState { booking };

    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/cancel", post(handlers::cancel_appointment_by_body))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/doctors/{doctor_id}/ledger-audit", get(handlers::audit_doctor_ledger))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
