// libs/appointment-cell/src/services/ledger.rs
use tracing::debug;

use crate::models::{AppointmentError, Doctor, SlotLedger};

/// Adds `time` to the doctor's booked set for `date`.
///
/// Fails with `DoctorNotAvailable` when the doctor is not bookable and with
/// `SlotNotAvailable` when the label is already held. On success the updated
/// ledger is returned so the caller can persist it.
pub fn reserve(doctor: &mut Doctor, date: &str, time: &str) -> Result<SlotLedger, AppointmentError> {
    if !doctor.available {
        debug!("Doctor {} is not available for booking", doctor.id);
        return Err(AppointmentError::DoctorNotAvailable);
    }

    if !doctor.slots_booked.insert(date, time) {
        debug!("Slot {} {} already booked for doctor {}", date, time, doctor.id);
        return Err(AppointmentError::SlotNotAvailable);
    }

    debug!("Reserved slot {} {} for doctor {}", date, time, doctor.id);
    Ok(doctor.slots_booked.clone())
}

/// Removes `time` from the doctor's booked set for `date`. Releasing a slot
/// that is not held is a no-op.
pub fn release(doctor: &mut Doctor, date: &str, time: &str) -> SlotLedger {
    if doctor.slots_booked.remove(date, time) {
        debug!("Released slot {} {} for doctor {}", date, time, doctor.id);
    } else {
        debug!("Slot {} {} was not held by doctor {}", date, time, doctor.id);
    }
    doctor.slots_booked.clone()
}
