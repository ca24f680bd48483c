// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFlag, Doctor, FlagUpdate, Patient, SlotLedger,
};
use crate::services::ledger;

/// Persistence boundary for doctors, patients and appointments.
///
/// `commit_booking` and `set_flag(.., Cancelled)` each touch both the doctor's
/// slot ledger and the appointment record; implementations must apply them as
/// one atomic unit per doctor so the ledger always matches the set of
/// non-cancelled appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError>;

    async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, AppointmentError>;

    /// Reserves the appointment's slot and inserts the appointment. Returns the
    /// doctor's updated ledger.
    async fn commit_booking(&self, appointment: &Appointment) -> Result<SlotLedger, AppointmentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError>;

    /// Sets one flag to true.
    ///
    /// `Cancelled` also releases the slot; on an already cancelled appointment
    /// nothing is written and `changed` is false. `Payment` fails with
    /// `AlreadyCancelled` on a cancelled appointment.
    async fn set_flag(&self, appointment_id: Uuid, flag: AppointmentFlag) -> Result<FlagUpdate, AppointmentError>;

    /// All appointments of a patient in creation order, cancelled ones included.
    async fn list_appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;
}

#[derive(Default)]
struct AppointmentTable {
    rows: HashMap<Uuid, (u64, Appointment)>,
    next_seq: u64,
}

impl AppointmentTable {
    fn insert(&mut self, appointment: Appointment) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(appointment.id, (seq, appointment));
    }

    fn get(&self, appointment_id: &Uuid) -> Option<&Appointment> {
        self.rows.get(appointment_id).map(|(_, appointment)| appointment)
    }

    fn get_mut(&mut self, appointment_id: &Uuid) -> Option<&mut Appointment> {
        self.rows.get_mut(appointment_id).map(|(_, appointment)| appointment)
    }

    fn collect_where<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut matches: Vec<&(u64, Appointment)> = self
            .rows
            .values()
            .filter(|(_, appointment)| predicate(appointment))
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        matches.into_iter().map(|(_, appointment)| appointment.clone()).collect()
    }
}

/// Doctors and patients preloaded into an in-memory store.
#[derive(Debug, Default, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

/// Process-local store. Each doctor sits behind its own mutex, which makes
/// reserve/release atomic per doctor while other doctors proceed in parallel.
///
/// Lock order is always doctor, then appointment table.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    doctors: RwLock<HashMap<Uuid, Arc<Mutex<Doctor>>>>,
    patients: RwLock<HashMap<Uuid, Patient>>,
    appointments: RwLock<AppointmentTable>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        debug!("Registering doctor {}", doctor.id);
        self.doctors
            .write()
            .await
            .insert(doctor.id, Arc::new(Mutex::new(doctor)));
    }

    pub async fn insert_patient(&self, patient: Patient) {
        debug!("Registering patient {}", patient.id);
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn load_seed(&self, seed: StoreSeed) {
        info!(
            "Loading {} doctors and {} patients into the in-memory store",
            seed.doctors.len(),
            seed.patients.len()
        );
        for doctor in seed.doctors {
            self.insert_doctor(doctor).await;
        }
        for patient in seed.patients {
            self.insert_patient(patient).await;
        }
    }

    async fn doctor_entry(&self, doctor_id: Uuid) -> Result<Arc<Mutex<Doctor>>, AppointmentError> {
        self.doctors
            .read()
            .await
            .get(&doctor_id)
            .cloned()
            .ok_or(AppointmentError::DoctorNotFound)
    }

    async fn cancel(&self, appointment_id: Uuid) -> Result<FlagUpdate, AppointmentError> {
        let doctor_id = self
            .appointments
            .read()
            .await
            .get(&appointment_id)
            .map(|appointment| appointment.doctor_id)
            .ok_or(AppointmentError::NotFound)?;

        let entry = self.doctor_entry(doctor_id).await?;
        let mut doctor = entry.lock().await;
        let mut table = self.appointments.write().await;

        let appointment = table
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;

        if appointment.cancelled {
            return Ok(FlagUpdate {
                appointment: appointment.clone(),
                changed: false,
            });
        }

        appointment.cancelled = true;
        ledger::release(&mut doctor, &appointment.slot_date, &appointment.slot_time);

        info!("Appointment {} cancelled, slot released", appointment_id);
        Ok(FlagUpdate {
            appointment: appointment.clone(),
            changed: true,
        })
    }

    async fn mark_paid(&self, appointment_id: Uuid) -> Result<FlagUpdate, AppointmentError> {
        let mut table = self.appointments.write().await;
        let appointment = table
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;

        if appointment.cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let changed = !appointment.payment;
        appointment.payment = true;

        Ok(FlagUpdate {
            appointment: appointment.clone(),
            changed,
        })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        let entry = self.doctor_entry(doctor_id).await?;
        let doctor = entry.lock().await;
        Ok(doctor.clone())
    }

    async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, AppointmentError> {
        self.patients
            .read()
            .await
            .get(&patient_id)
            .cloned()
            .ok_or(AppointmentError::PatientNotFound)
    }

    async fn commit_booking(&self, appointment: &Appointment) -> Result<SlotLedger, AppointmentError> {
        let entry = self.doctor_entry(appointment.doctor_id).await?;
        let mut doctor = entry.lock().await;
        let mut table = self.appointments.write().await;

        if table.get(&appointment.id).is_some() {
            return Err(AppointmentError::ValidationError(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }

        let ledger = ledger::reserve(&mut doctor, &appointment.slot_date, &appointment.slot_time)?;
        table.insert(appointment.clone());

        Ok(ledger)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .read()
            .await
            .get(&appointment_id)
            .cloned()
            .ok_or(AppointmentError::NotFound)
    }

    async fn set_flag(&self, appointment_id: Uuid, flag: AppointmentFlag) -> Result<FlagUpdate, AppointmentError> {
        debug!("Setting {} on appointment {}", flag, appointment_id);
        match flag {
            AppointmentFlag::Cancelled => self.cancel(appointment_id).await,
            AppointmentFlag::Payment => self.mark_paid(appointment_id).await,
        }
    }

    async fn list_appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .read()
            .await
            .collect_where(|appointment| appointment.patient_id == patient_id))
    }

    async fn list_appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .read()
            .await
            .collect_where(|appointment| appointment.doctor_id == doctor_id))
    }
}
