use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::slots::format_slot_time;
use doctor_cell::services::DoctorDirectory;
use patient_cell::models::PatientProfile;
use patient_cell::services::PatientRegistry;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, DoctorSummary, DoctorView, PatientContext,
    PatientView, ValidationReason, MAX_NOTES_LENGTH,
};
use crate::services::store::AppointmentStore;

const UNKNOWN_PATIENT: &str = "Unknown";
const NO_HISTORY: &str = "No history provided";

/// Patient read shape. `doctor` is the current directory entry, if the doctor is still listed.
pub fn project_for_patient(
    appointment: &Appointment,
    doctor: Option<&Doctor>,
    now: DateTime<Utc>,
) -> PatientView {
    let status = appointment.derived_status(now);

    PatientView {
        id: appointment.id,
        title: format!("{} with {}", appointment.appointment_type, appointment.doctor_name),
        doctor: DoctorSummary {
            id: appointment.doctor_id.clone(),
            name: appointment.doctor_name.clone(),
            specialty: doctor.map(|d| d.specialty.clone()),
            qualification: doctor.map(|d| d.qualification.clone()),
            image_url: doctor.and_then(|d| d.image_url.clone()),
        },
        appointment_type: appointment.appointment_type.clone(),
        date: appointment.date,
        time: format_slot_time(appointment.time),
        start_time: appointment.start_time,
        end_time: appointment.end_time,
        status,
        video_link: appointment.video_link.clone(),
        can_cancel: status == AppointmentStatus::Upcoming,
    }
}

/// Doctor read shape. A booking patient without a profile is shown as unknown.
pub fn project_for_doctor(
    appointment: &Appointment,
    patient: Option<&PatientProfile>,
    now: DateTime<Utc>,
) -> DoctorView {
    let health = patient.and_then(|p| p.health.as_ref());
    let status = appointment.derived_status(now);

    DoctorView {
        id: appointment.id,
        patient: PatientContext {
            id: appointment.patient_id.clone(),
            name: patient
                .map(|p| p.name.clone())
                .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
            age: health.and_then(|h| h.age),
            gender: health.and_then(|h| h.gender.clone()),
            email: patient.map(|p| p.email.clone()),
            medical_history: health
                .and_then(|h| h.medical_history.clone())
                .filter(|history| !history.trim().is_empty())
                .unwrap_or_else(|| NO_HISTORY.to_string()),
        },
        appointment_type: appointment.appointment_type.clone(),
        date: appointment.date,
        time: format_slot_time(appointment.time),
        start_time: appointment.start_time,
        end_time: appointment.end_time,
        status,
        video_link: appointment.video_link.clone(),
        notes: appointment.notes.clone(),
        can_join_video: status != AppointmentStatus::Cancelled,
    }
}

/// Joins appointments with directory and patient context, and owns doctor notes.
pub struct ProjectionService {
    directory: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientRegistry>,
    store: Arc<dyn AppointmentStore>,
}

impl ProjectionService {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        patients: Arc<dyn PatientRegistry>,
        store: Arc<dyn AppointmentStore>,
    ) -> Self {
        Self {
            directory,
            patients,
            store,
        }
    }

    pub async fn patient_views(
        &self,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<Vec<PatientView>, AppointmentError> {
        let doctors: HashMap<String, Doctor> = self
            .directory
            .list_doctors()
            .await
            .map_err(|e| AppointmentError::ExternalService(e.to_string()))?
            .into_iter()
            .map(|doctor| (doctor.id.clone(), doctor))
            .collect();

        Ok(appointments
            .iter()
            .map(|appointment| {
                project_for_patient(appointment, doctors.get(&appointment.doctor_id), now)
            })
            .collect())
    }

    pub async fn doctor_views(
        &self,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<Vec<DoctorView>, AppointmentError> {
        let mut profiles: HashMap<String, Option<PatientProfile>> = HashMap::new();

        for appointment in appointments {
            if profiles.contains_key(&appointment.patient_id) {
                continue;
            }
            let profile = self
                .patients
                .get_profile(&appointment.patient_id)
                .await
                .map_err(|e| AppointmentError::ExternalService(e.to_string()))?;
            if profile.is_none() {
                debug!("No profile for patient {}", appointment.patient_id);
            }
            profiles.insert(appointment.patient_id.clone(), profile);
        }

        Ok(appointments
            .iter()
            .map(|appointment| {
                let profile = profiles.get(&appointment.patient_id).and_then(Option::as_ref);
                project_for_doctor(appointment, profile, now)
            })
            .collect())
    }

    /// Replaces the notes of an active appointment. Only its assigned doctor may write them.
    pub async fn save_notes(
        &self,
        id: Uuid,
        doctor_id: &str,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get(id)
            .await?
            .filter(|appointment| !appointment.is_cancelled())
            .ok_or(AppointmentError::NotFound)?;

        if appointment.doctor_id != doctor_id {
            warn!("Doctor {} attempted to write notes on appointment {}", doctor_id, id);
            return Err(AppointmentError::Forbidden(
                "Only the assigned doctor can write notes for this appointment".to_string(),
            ));
        }

        if notes.chars().count() > MAX_NOTES_LENGTH {
            return Err(AppointmentError::validation(
                ValidationReason::NotesTooLong,
                format!("Notes must be at most {} characters", MAX_NOTES_LENGTH),
            ));
        }

        let mut saved = self.store.save_notes(id, notes, now).await?;
        saved.status = saved.derived_status(now);

        info!("Notes saved for appointment {}", id);
        Ok(saved)
    }
}
