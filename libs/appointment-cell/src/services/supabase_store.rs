// libs/appointment-cell/src/services/supabase_store.rs
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentFlag, Doctor, FlagUpdate, Patient, SlotLedger,
};
use crate::services::store::AppointmentStore;

/// Store backed by Supabase tables. Writes run inside the Postgres functions
/// `book_appointment_slot`, `cancel_appointment_slot` and `mark_appointment_paid`
/// (see `supabase/migrations`), each a single transaction.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    write_key: String,
}

#[derive(Debug, Deserialize)]
struct BookingRpcResult {
    status: String,
    #[serde(default)]
    slots_booked: Option<SlotLedger>,
}

#[derive(Debug, Deserialize)]
struct FlagRpcResult {
    status: String,
    #[serde(default)]
    appointment: Option<Appointment>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            write_key: config.supabase_write_key().to_string(),
        }
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(&self.write_key), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse rows: {}", e)))
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        path: &str,
        missing: AppointmentError,
    ) -> Result<T, AppointmentError> {
        self.fetch_rows(path).await?.into_iter().next().ok_or(missing)
    }

    async fn call_rpc<T: DeserializeOwned>(&self, function: &str, args: Value) -> Result<T, AppointmentError> {
        debug!("Calling rpc {}", function);
        self.supabase
            .rpc(function, Some(&self.write_key), args)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    fn flag_update(result: FlagRpcResult, changed: bool) -> Result<FlagUpdate, AppointmentError> {
        let appointment = result.appointment.ok_or_else(|| {
            AppointmentError::DatabaseError("rpc result carried no appointment".to_string())
        })?;
        Ok(FlagUpdate { appointment, changed })
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        self.fetch_one(&path, AppointmentError::DoctorNotFound).await
    }

    async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.fetch_one(&path, AppointmentError::PatientNotFound).await
    }

    async fn commit_booking(&self, appointment: &Appointment) -> Result<SlotLedger, AppointmentError> {
        let result: BookingRpcResult = self
            .call_rpc("book_appointment_slot", json!({ "p_appointment": appointment }))
            .await?;

        match result.status.as_str() {
            "booked" => {
                info!("Slot {} {} committed for appointment {}",
                      appointment.slot_date, appointment.slot_time, appointment.id);
                Ok(result.slots_booked.unwrap_or_default())
            }
            "slot_unavailable" => Err(AppointmentError::SlotNotAvailable),
            "doctor_unavailable" => Err(AppointmentError::DoctorNotAvailable),
            "doctor_not_found" => Err(AppointmentError::DoctorNotFound),
            other => {
                warn!("Unexpected booking rpc status: {}", other);
                Err(AppointmentError::DatabaseError(format!("Unexpected booking status: {}", other)))
            }
        }
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.fetch_one(&path, AppointmentError::NotFound).await
    }

    async fn set_flag(&self, appointment_id: Uuid, flag: AppointmentFlag) -> Result<FlagUpdate, AppointmentError> {
        let function = match flag {
            AppointmentFlag::Cancelled => "cancel_appointment_slot",
            AppointmentFlag::Payment => "mark_appointment_paid",
        };

        let result: FlagRpcResult = self
            .call_rpc(function, json!({ "p_appointment_id": appointment_id }))
            .await?;

        let status = result.status.clone();
        match (flag, status.as_str()) {
            (AppointmentFlag::Cancelled, "cancelled") | (AppointmentFlag::Payment, "paid") => {
                Self::flag_update(result, true)
            }
            (AppointmentFlag::Cancelled, "already_cancelled") | (AppointmentFlag::Payment, "already_paid") => {
                Self::flag_update(result, false)
            }
            (AppointmentFlag::Payment, "cancelled") => Err(AppointmentError::AlreadyCancelled),
            (_, "not_found") => Err(AppointmentError::NotFound),
            (_, other) => {
                warn!("Unexpected {} rpc status: {}", function, other);
                Err(AppointmentError::DatabaseError(format!("Unexpected {} status: {}", flag, other)))
            }
        }
    }

    async fn list_appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=created_at.asc",
            patient_id
        );
        self.fetch_rows(&path).await
    }

    async fn list_appointments_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=created_at.asc",
            doctor_id
        );
        self.fetch_rows(&path).await
    }
}
