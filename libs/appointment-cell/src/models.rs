// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use shared_models::error::{AppError, ErrorKind};

/// Longest date or time label accepted for a slot.
pub const MAX_SLOT_LABEL_LEN: usize = 32;

// ==============================================================================
// EXTERNAL ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub address: Value,
    pub available: bool,
    pub fees: i64,
    #[serde(default)]
    pub slots_booked: SlotLedger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

// ==============================================================================
// SLOT LEDGER
// ==============================================================================

/// Booked time labels of one doctor, keyed by date label.
///
/// Serialized as `{ "<date>": ["<time>", ...] }`, the shape stored on the
/// doctor document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotLedger(BTreeMap<String, BTreeSet<String>>);

impl SlotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: &str, time: &str) -> bool {
        self.0.get(date).map_or(false, |times| times.contains(time))
    }

    pub fn times_on(&self, date: &str) -> Option<&BTreeSet<String>> {
        self.0.get(date)
    }

    /// Every (date, time) pair held in the ledger.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(date, times)| times.iter().map(move |time| (date.as_str(), time.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, date: &str, time: &str) -> bool {
        self.0.entry(date.to_string()).or_default().insert(time.to_string())
    }

    pub(crate) fn remove(&mut self, date: &str, time: &str) -> bool {
        let Some(times) = self.0.get_mut(date) else {
            return false;
        };
        let removed = times.remove(time);
        if times.is_empty() {
            self.0.remove(date);
        }
        removed
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

/// Doctor data as it was when the appointment was booked. Never refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub address: Value,
    pub fees: i64,
}

impl From<&Doctor> for DoctorSnapshot {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            email: doctor.email.clone(),
            speciality: doctor.speciality.clone(),
            degree: doctor.degree.clone(),
            experience: doctor.experience.clone(),
            about: doctor.about.clone(),
            image: doctor.image.clone(),
            address: doctor.address.clone(),
            fees: doctor.fees,
        }
    }
}

/// Patient data as it was when the appointment was booked. Never refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

impl From<&Patient> for PatientSnapshot {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            image: patient.image.clone(),
            address: patient.address.clone(),
            gender: patient.gender.clone(),
            dob: patient.dob.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: String,
    pub slot_time: String,
    pub patient_data: PatientSnapshot,
    pub doctor_data: DoctorSnapshot,
    /// Doctor fee at booking time, in major currency units.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub payment: bool,
}

impl Appointment {
    /// New unpaid, non-cancelled appointment snapshotting both parties.
    pub fn new(patient: &Patient, doctor: &Doctor, slot_date: &str, slot_time: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            slot_date: slot_date.to_string(),
            slot_time: slot_time.to_string(),
            patient_data: PatientSnapshot::from(patient),
            doctor_data: DoctorSnapshot::from(doctor),
            amount: doctor.fees,
            created_at: Utc::now(),
            cancelled: false,
            payment: false,
        }
    }

    pub fn is_owned_by(&self, patient_id: Uuid) -> bool {
        self.patient_id == patient_id
    }

    /// Whether this appointment should hold a slot in the doctor's ledger.
    pub fn holds_slot(&self) -> bool {
        !self.cancelled
    }
}

/// The two externally mutable appointment flags. Both only ever go false -> true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentFlag {
    Payment,
    Cancelled,
}

impl fmt::Display for AppointmentFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentFlag::Payment => write!(f, "payment"),
            AppointmentFlag::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a flag write: the stored appointment and whether the flag flipped.
#[derive(Debug, Clone)]
pub struct FlagUpdate {
    pub appointment: Appointment,
    pub changed: bool,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(alias = "docId")]
    pub doctor_id: Uuid,
    #[serde(alias = "slotDate")]
    pub slot_date: String,
    #[serde(alias = "slotTime")]
    pub slot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
}

/// Disagreement between a doctor's ledger and their active appointments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerAudit {
    pub doctor_id: Uuid,
    /// Ledger entries with no active appointment behind them.
    pub orphaned_reservations: Vec<SlotRef>,
    /// Active appointments whose slot is missing from the ledger.
    pub unreserved_appointments: Vec<Uuid>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_reservations.is_empty() && self.unreserved_appointments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotRef {
    pub slot_date: String,
    pub slot_time: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Slot Not Available")]
    SlotNotAvailable,

    #[error("Doctor Not Available")]
    DoctorNotAvailable,

    #[error("Unauthorized action")]
    Unauthorized,

    #[error("Appointment already cancelled")]
    AlreadyCancelled,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => ErrorKind::NotFound,
            AppointmentError::SlotNotAvailable | AppointmentError::AlreadyCancelled => {
                ErrorKind::Conflict
            }
            AppointmentError::DoctorNotAvailable => ErrorKind::Unavailable,
            AppointmentError::Unauthorized => ErrorKind::Unauthorized,
            AppointmentError::ValidationError(_) => ErrorKind::Validation,
            AppointmentError::DatabaseError(_) => ErrorKind::Internal,
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        AppError::from_kind(error.kind(), error.to_string())
    }
}

/// Rejects empty, padded or oversized slot labels.
pub fn validate_slot_label(field: &str, value: &str) -> Result<(), AppointmentError> {
    if value.trim().is_empty() {
        return Err(AppointmentError::ValidationError(format!("{} is required", field)));
    }
    if value.trim() != value {
        return Err(AppointmentError::ValidationError(format!(
            "{} must not have surrounding whitespace",
            field
        )));
    }
    if value.len() > MAX_SLOT_LABEL_LEN {
        return Err(AppointmentError::ValidationError(format!(
            "{} must be at most {} characters",
            field, MAX_SLOT_LABEL_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ledger_serializes_as_date_map() {
        let mut ledger = SlotLedger::new();
        ledger.insert("2024-05-01", "10:00");
        ledger.insert("2024-05-01", "09:30");

        assert_eq!(
            serde_json::to_value(&ledger).unwrap(),
            json!({ "2024-05-01": ["09:30", "10:00"] })
        );

        let parsed: SlotLedger = serde_json::from_value(json!({ "1_5_2024": ["10:00 AM"] })).unwrap();
        assert!(parsed.contains("1_5_2024", "10:00 AM"));
        assert!(!parsed.contains("1_5_2024", "10:00"));
    }

    #[test]
    fn test_ledger_remove_drops_empty_dates() {
        let mut ledger = SlotLedger::new();
        ledger.insert("2024-05-01", "10:00");

        assert!(ledger.remove("2024-05-01", "10:00"));
        assert!(ledger.is_empty());
        assert!(!ledger.remove("2024-05-01", "10:00"));
    }

    #[test]
    fn test_doctor_snapshot_excludes_ledger() {
        let doctor: Doctor = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": "Dr. Test",
            "available": true,
            "fees": 500,
            "slots_booked": { "2024-05-01": ["10:00"] }
        }))
        .unwrap();

        let snapshot = serde_json::to_value(DoctorSnapshot::from(&doctor)).unwrap();
        assert!(snapshot.get("slots_booked").is_none());
        assert_eq!(snapshot["fees"], 500);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppointmentError::SlotNotAvailable.kind(), ErrorKind::Conflict);
        assert_eq!(AppointmentError::DoctorNotAvailable.kind(), ErrorKind::Unavailable);
        assert_eq!(AppointmentError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(AppointmentError::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(AppointmentError::AlreadyCancelled.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_validate_slot_label() {
        assert!(validate_slot_label("slot_time", "10:00").is_ok());
        assert!(validate_slot_label("slot_time", "").is_err());
        assert!(validate_slot_label("slot_time", " 10:00").is_err());
        assert!(validate_slot_label("slot_time", &"x".repeat(MAX_SLOT_LABEL_LEN + 1)).is_err());
    }

    #[test]
    fn test_book_request_accepts_camel_case() {
        let doctor_id = Uuid::new_v4();
        let request: BookAppointmentRequest = serde_json::from_value(json!({
            "docId": doctor_id,
            "slotDate": "2024-05-01",
            "slotTime": "10:00"
        }))
        .unwrap();

        assert_eq!(request.doctor_id, doctor_id);
        assert_eq!(request.slot_time, "10:00");
    }
}
