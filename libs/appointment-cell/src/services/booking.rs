// libs/appointment-cell/src/services/booking.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    validate_slot_label, Appointment, AppointmentError, AppointmentFlag, BookAppointmentRequest,
    LedgerAudit, SlotRef,
};
use crate::services::store::AppointmentStore;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Books `request.slot_time` on `request.slot_date` with the doctor for the
    /// given patient.
    ///
    /// Availability and the slot are checked on a read snapshot first;
    /// `commit_booking` re-checks both atomically.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {} at {} {}",
              patient_id, request.doctor_id, request.slot_date, request.slot_time);

        validate_slot_label("slot_date", &request.slot_date)?;
        validate_slot_label("slot_time", &request.slot_time)?;

        let doctor = self.store.get_doctor(request.doctor_id).await?;

        if !doctor.available {
            warn!("Doctor {} is not available", doctor.id);
            return Err(AppointmentError::DoctorNotAvailable);
        }

        if doctor.slots_booked.contains(&request.slot_date, &request.slot_time) {
            debug!("Slot {} {} already held for doctor {}", request.slot_date, request.slot_time, doctor.id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        let patient = self.store.get_patient(patient_id).await?;

        let appointment = Appointment::new(&patient, &doctor, &request.slot_date, &request.slot_time);
        self.store.commit_booking(&appointment).await?;

        info!("Appointment {} booked for patient {} with doctor {}",
              appointment.id, patient_id, doctor.id);
        Ok(appointment)
    }

    /// Cancels an appointment owned by the patient and frees its slot.
    ///
    /// A second cancel of the same appointment returns `AlreadyCancelled` and
    /// leaves the ledger untouched.
    pub async fn cancel_appointment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {} for patient {}", appointment_id, patient_id);

        let appointment = self.get_appointment(patient_id, appointment_id).await?;

        if appointment.cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let update = self
            .store
            .set_flag(appointment_id, AppointmentFlag::Cancelled)
            .await?;

        if !update.changed {
            // Lost a race with a concurrent cancel of the same appointment.
            return Err(AppointmentError::AlreadyCancelled);
        }

        info!("Appointment {} cancelled by patient {}", appointment_id, patient_id);
        Ok(update.appointment)
    }

    /// Fetches an appointment, refusing anyone but its patient.
    pub async fn get_appointment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get_appointment(appointment_id).await?;

        if !appointment.is_owned_by(patient_id) {
            warn!("Patient {} attempted to access appointment {} owned by {}",
                  patient_id, appointment_id, appointment.patient_id);
            return Err(AppointmentError::Unauthorized);
        }

        Ok(appointment)
    }

    /// Booking history of a patient, oldest first.
    pub async fn list_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for patient {}", patient_id);
        self.store.list_appointments_for_patient(patient_id).await
    }

    /// Compares a doctor's slot ledger with their non-cancelled appointments.
    pub async fn audit_ledger(&self, doctor_id: Uuid) -> Result<LedgerAudit, AppointmentError> {
        let doctor = self.store.get_doctor(doctor_id).await?;
        let appointments = self.store.list_appointments_for_doctor(doctor_id).await?;

        let held: BTreeSet<SlotRef> = appointments
            .iter()
            .filter(|appointment| appointment.holds_slot())
            .map(|appointment| SlotRef {
                slot_date: appointment.slot_date.clone(),
                slot_time: appointment.slot_time.clone(),
            })
            .collect();

        let orphaned_reservations: Vec<SlotRef> = doctor
            .slots_booked
            .entries()
            .map(|(date, time)| SlotRef {
                slot_date: date.to_string(),
                slot_time: time.to_string(),
            })
            .filter(|slot| !held.contains(slot))
            .collect();

        let unreserved_appointments: Vec<Uuid> = appointments
            .iter()
            .filter(|appointment| appointment.holds_slot())
            .filter(|appointment| {
                !doctor
                    .slots_booked
                    .contains(&appointment.slot_date, &appointment.slot_time)
            })
            .map(|appointment| appointment.id)
            .collect();

        let audit = LedgerAudit {
            doctor_id,
            orphaned_reservations,
            unreserved_appointments,
        };

        if !audit.is_consistent() {
            warn!("Ledger drift for doctor {}: {} orphaned, {} unreserved",
                  doctor_id, audit.orphaned_reservations.len(), audit.unreserved_appointments.len());
        }

        Ok(audit)
    }
}
