use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

/// Role-scoped listings and the cancel transition.
pub struct LifecycleService {
    store: Arc<dyn AppointmentStore>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.store.list_active_for_patient(patient_id).await?;
        Ok(annotate_and_sort(appointments, now))
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.store.list_active_for_doctor(doctor_id).await?;
        Ok(annotate_and_sort(appointments, now))
    }

    /// An active appointment visible to its patient or its doctor.
    pub async fn get_for(
        &self,
        id: Uuid,
        requester: &User,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.active(id).await?;

        let visible = match requester.role() {
            Some(Role::Patient) => appointment.patient_id == requester.id,
            Some(Role::Doctor) => appointment.doctor_id == requester.id,
            None => false,
        };
        if !visible {
            warn!("User {} denied access to appointment {}", requester.id, id);
            return Err(AppointmentError::Forbidden(
                "You are not a participant of this appointment".to_string(),
            ));
        }

        appointment.status = appointment.derived_status(now);
        Ok(appointment)
    }

    /// Cancels an active appointment on behalf of its booking patient.
    ///
    /// Allowed whether or not the start time has passed. Cancelling releases the slot.
    pub async fn cancel(
        &self,
        id: Uuid,
        requester_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.active(id).await?;

        if appointment.patient_id != requester_id {
            warn!("User {} attempted to cancel appointment {} they did not book", requester_id, id);
            return Err(AppointmentError::Forbidden(
                "Only the patient who booked this appointment can cancel it".to_string(),
            ));
        }

        // Conditional on the record still being active, so a racing cancel yields NotFound.
        let cancelled = self.store.cancel(id, now).await?;
        info!("Appointment {} cancelled by patient {}", id, requester_id);
        Ok(cancelled)
    }

    async fn active(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Loading appointment {}", id);
        self.store
            .get(id)
            .await?
            .filter(|appointment| !appointment.is_cancelled())
            .ok_or(AppointmentError::NotFound)
    }
}

/// Replaces the stored status with the derived one and orders by start, then creation, then id.
pub fn annotate_and_sort(
    mut appointments: Vec<Appointment>,
    now: DateTime<Utc>,
) -> Vec<Appointment> {
    appointments.retain(|appointment| !appointment.is_cancelled());
    for appointment in &mut appointments {
        appointment.status = appointment.derived_status(now);
    }
    appointments.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    appointments
}
