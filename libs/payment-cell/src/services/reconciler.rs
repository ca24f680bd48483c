// libs/payment-cell/src/services/reconciler.rs
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentFlag};
use appointment_cell::services::AppointmentStore;

use crate::models::{
    CheckoutSession, CheckoutVerification, NewCheckoutSession, NewOrder, OrderStatus,
    PaymentError, PaymentOrder, PaymentOutcome, PaymentSettings,
};
use crate::services::gateway::{validate_provider_id, CheckoutGateway, OrderGateway};

const CHECKOUT_PRODUCT_NAME: &str = "Appointment Fees";

/// Fees are stored in major units; providers take the smallest unit.
/// Assumes a two-decimal currency.
pub fn to_minor_units(amount: i64) -> Result<i64, PaymentError> {
    if amount < 0 {
        return Err(PaymentError::ValidationError("Amount must not be negative".to_string()));
    }
    amount
        .checked_mul(100)
        .ok_or_else(|| PaymentError::ValidationError(format!("Amount {} is too large", amount)))
}

/// Drives both payment flows and is the only writer of the payment flag.
pub struct PaymentReconciler {
    store: Arc<dyn AppointmentStore>,
    orders: Option<Arc<dyn OrderGateway>>,
    checkout: Option<Arc<dyn CheckoutGateway>>,
    settings: PaymentSettings,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn AppointmentStore>, settings: PaymentSettings) -> Self {
        Self {
            store,
            orders: None,
            checkout: None,
            settings,
        }
    }

    pub fn with_order_gateway(mut self, gateway: Arc<dyn OrderGateway>) -> Self {
        self.orders = Some(gateway);
        self
    }

    pub fn with_checkout_gateway(mut self, gateway: Arc<dyn CheckoutGateway>) -> Self {
        self.checkout = Some(gateway);
        self
    }

    fn order_gateway(&self) -> Result<&Arc<dyn OrderGateway>, PaymentError> {
        self.orders
            .as_ref()
            .ok_or_else(|| PaymentError::ProviderNotConfigured("Razorpay".to_string()))
    }

    fn checkout_gateway(&self) -> Result<&Arc<dyn CheckoutGateway>, PaymentError> {
        self.checkout
            .as_ref()
            .ok_or_else(|| PaymentError::ProviderNotConfigured("Stripe".to_string()))
    }

    /// Fetches an appointment, refusing anyone but its patient.
    pub async fn owned_appointment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, PaymentError> {
        let appointment = self.store.get_appointment(appointment_id).await?;

        if !appointment.is_owned_by(patient_id) {
            warn!("Patient {} attempted to pay for appointment {} owned by {}",
                  patient_id, appointment_id, appointment.patient_id);
            return Err(PaymentError::Unauthorized);
        }

        Ok(appointment)
    }

    /// Appointment that may still be charged: not cancelled and not yet paid.
    async fn payable_appointment(&self, appointment_id: Uuid) -> Result<Appointment, PaymentError> {
        let appointment = self.store.get_appointment(appointment_id).await?;

        if appointment.cancelled {
            return Err(PaymentError::AppointmentInvalid);
        }
        if appointment.payment {
            return Err(PaymentError::AlreadyPaid);
        }

        Ok(appointment)
    }

    async fn mark_paid(&self, appointment_id: Uuid) -> Result<PaymentOutcome, PaymentError> {
        let update = self
            .store
            .set_flag(appointment_id, AppointmentFlag::Payment)
            .await?;

        if update.changed {
            info!("Appointment {} marked as paid", appointment_id);
        } else {
            debug!("Appointment {} was already paid", appointment_id);
        }

        Ok(PaymentOutcome::Paid {
            appointment_id,
            already_paid: !update.changed,
        })
    }

    // ==========================================================================
    // ORDER FLOW
    // ==========================================================================

    /// Creates a provider order for the appointment fee. The receipt carries
    /// the appointment id so verification can find it again.
    pub async fn create_order(&self, appointment_id: Uuid) -> Result<PaymentOrder, PaymentError> {
        let gateway = self.order_gateway()?;
        let appointment = self.payable_appointment(appointment_id).await?;

        let order = NewOrder {
            amount: to_minor_units(appointment.amount)?,
            currency: self.settings.currency.clone(),
            receipt: appointment.id.to_string(),
        };

        let created = gateway.create_order(&order).await?;

        info!("Order {} created for appointment {} ({} {})",
              created.id, appointment.id, created.amount, created.currency);
        Ok(created)
    }

    /// Polls the provider and records the payment when the order is paid.
    /// Repeat calls report `already_paid` without writing again.
    pub async fn verify_order(&self, order_id: &str) -> Result<PaymentOutcome, PaymentError> {
        let order_id = validate_provider_id("Order id", order_id.trim())?;

        let gateway = self.order_gateway()?;
        let order = gateway.fetch_order(order_id).await?;

        if order.id != order_id {
            warn!("Provider answered order {} with order {}", order_id, order.id);
            return Err(PaymentError::ReceiptMismatch);
        }

        if order.status != OrderStatus::Paid {
            info!("Order {} is not paid (status {})", order.id, order.status);
            return Ok(PaymentOutcome::NotPaid {
                provider_status: order.status.to_string(),
            });
        }

        let appointment_id = order
            .receipt
            .as_deref()
            .and_then(|receipt| Uuid::parse_str(receipt).ok())
            .ok_or_else(|| {
                warn!("Paid order {} carries no appointment receipt", order.id);
                PaymentError::ReceiptMismatch
            })?;

        self.mark_paid(appointment_id).await
    }

    // ==========================================================================
    // CHECKOUT FLOW
    // ==========================================================================

    /// Opens a hosted checkout session and returns it; the session url is
    /// where the patient is redirected.
    pub async fn create_checkout_session(
        &self,
        appointment_id: Uuid,
        return_origin: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let gateway = self.checkout_gateway()?;
        let origin = validate_origin(return_origin)?;
        let appointment = self.payable_appointment(appointment_id).await?;

        let session = NewCheckoutSession {
            appointment_id: appointment.id,
            product_name: CHECKOUT_PRODUCT_NAME.to_string(),
            unit_amount: to_minor_units(appointment.amount)?,
            currency: self.settings.currency.to_lowercase(),
            success_url: format!(
                "{}/verify?success=true&appointmentId={}&session_id={{CHECKOUT_SESSION_ID}}",
                origin, appointment.id
            ),
            cancel_url: format!("{}/verify?success=false&appointmentId={}", origin, appointment.id),
        };

        let created = gateway.create_session(&session).await?;

        info!("Checkout session {} created for appointment {}", created.id, appointment.id);
        Ok(created)
    }

    /// Records the outcome of a checkout redirect.
    pub async fn confirm_checkout(
        &self,
        appointment_id: Uuid,
        success: bool,
        session_id: Option<&str>,
    ) -> Result<PaymentOutcome, PaymentError> {
        if !success {
            info!("Checkout for appointment {} reported as not completed", appointment_id);
            return Ok(PaymentOutcome::NotPaid {
                provider_status: "not_completed".to_string(),
            });
        }

        let appointment = self.store.get_appointment(appointment_id).await?;
        if appointment.cancelled {
            return Err(PaymentError::AppointmentInvalid);
        }

        match self.settings.checkout_verification {
            CheckoutVerification::TrustClient => {
                warn!("Marking appointment {} paid on the client's report alone", appointment_id);
                self.mark_paid(appointment_id).await
            }
            CheckoutVerification::ServerSide => {
                let session_id = validate_provider_id("Session id", session_id.unwrap_or_default().trim())?;

                let session = self.checkout_gateway()?.fetch_session(session_id).await?;

                if session.id != session_id {
                    warn!("Provider answered session {} with session {}", session_id, session.id);
                    return Err(PaymentError::ReceiptMismatch);
                }

                if session.client_reference_id.as_deref() != Some(appointment_id.to_string().as_str()) {
                    warn!("Checkout session {} does not belong to appointment {}", session.id, appointment_id);
                    return Err(PaymentError::ReceiptMismatch);
                }

                if !session.is_paid() {
                    info!("Checkout session {} is not paid (status {})", session.id, session.payment_status);
                    return Ok(PaymentOutcome::NotPaid {
                        provider_status: session.payment_status,
                    });
                }

                self.mark_paid(appointment_id).await
            }
        }
    }
}

/// Accepts an absolute http(s) origin and returns it without a trailing slash.
fn validate_origin(origin: &str) -> Result<String, PaymentError> {
    let invalid = || PaymentError::ValidationError(format!("Invalid return origin: {}", origin));

    let url = Url::parse(origin.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}
