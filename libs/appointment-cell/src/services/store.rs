use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotKey};

#[derive(Debug, Error)]
pub enum StoreError {
    /// An active appointment already holds the slot.
    #[error("Slot already held by an active appointment")]
    Conflict,

    #[error("No active appointment with that id")]
    NotFound,

    #[error("Appointment store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppointmentError::AlreadyBooked,
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::Unavailable(msg) => AppointmentError::Store(msg),
        }
    }
}

/// Persistence for appointments with a unique index over active (doctor, date, time) keys.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Inserts unless an active appointment holds the same slot, in one atomic step.
    async fn insert_if_absent(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Any appointment with this id, cancelled ones included.
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_active_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_active_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, StoreError>;

    /// Marks an active appointment cancelled and releases its slot.
    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, StoreError>;

    async fn save_notes(
        &self,
        id: Uuid,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;
}

#[derive(Default)]
struct Arena {
    appointments: Vec<Appointment>,
    by_id: HashMap<Uuid, usize>,
    by_patient: HashMap<String, Vec<usize>>,
    by_doctor: HashMap<String, Vec<usize>>,
    /// Only active appointments are indexed here.
    slot_index: HashMap<SlotKey, usize>,
}

impl Arena {
    fn active_entry(&mut self, id: Uuid) -> Option<&mut Appointment> {
        let idx = *self.by_id.get(&id)?;
        self.appointments
            .get_mut(idx)
            .filter(|appointment| !appointment.is_cancelled())
    }

    fn active_at(&self, indices: Option<&Vec<usize>>) -> Vec<Appointment> {
        indices
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.appointments.get(idx))
            .filter(|appointment| !appointment.is_cancelled())
            .cloned()
            .collect()
    }
}

/// Appointments kept in an append-only arena behind one lock.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    arena: RwLock<Arena>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_if_absent(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let key = appointment.slot_key();
        let mut arena = self.arena.write().await;

        if arena.slot_index.contains_key(&key) {
            warn!(
                "Slot {} {} {} already held",
                key.doctor_id, key.date, key.time
            );
            return Err(StoreError::Conflict);
        }

        let idx = arena.appointments.len();
        arena.slot_index.insert(key, idx);
        arena.by_id.insert(appointment.id, idx);
        arena
            .by_patient
            .entry(appointment.patient_id.clone())
            .or_default()
            .push(idx);
        arena
            .by_doctor
            .entry(appointment.doctor_id.clone())
            .or_default()
            .push(idx);
        arena.appointments.push(appointment.clone());

        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let arena = self.arena.read().await;
        Ok(arena
            .by_id
            .get(&id)
            .and_then(|&idx| arena.appointments.get(idx))
            .cloned())
    }

    async fn list_active_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let arena = self.arena.read().await;
        Ok(arena.active_at(arena.by_patient.get(patient_id)))
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let arena = self.arena.read().await;
        Ok(arena.active_at(arena.by_doctor.get(doctor_id)))
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, StoreError> {
        let mut arena = self.arena.write().await;

        let appointment = arena.active_entry(id).ok_or(StoreError::NotFound)?;
        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_at = Some(at);
        appointment.updated_at = at;
        let cancelled = appointment.clone();

        arena.slot_index.remove(&cancelled.slot_key());
        Ok(cancelled)
    }

    async fn save_notes(
        &self,
        id: Uuid,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut arena = self.arena.write().await;

        let appointment = arena.active_entry(id).ok_or(StoreError::NotFound)?;
        appointment.notes = Some(notes);
        appointment.updated_at = at;
        Ok(appointment.clone())
    }
}

/// Store backed by the `appointments` table.
///
/// The table carries a partial unique index on
/// `(doctor_id, date, time) WHERE status <> 'cancelled'`, so a losing concurrent insert
/// comes back as 409.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
    api_key: String,
}

const ACTIVE_ORDER: &str = "status=neq.cancelled&order=start_time.asc,created_at.asc,id.asc";

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            api_key: config.supabase_store_key().to_string(),
        }
    }

    async fn select(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        self.supabase
            .request(Method::GET, path, Some(&self.api_key), None)
            .await
            .map_err(unavailable)
    }

    /// PATCH guarded by `status=eq.upcoming`; an empty result means nothing active matched.
    async fn update_active(
        &self,
        id: Uuid,
        body: serde_json::Value,
    ) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.upcoming", id);
        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.api_key),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(unavailable)?;

        result.into_iter().next().ok_or(StoreError::NotFound)
    }
}

fn unavailable(err: SupabaseError) -> StoreError {
    error!("Appointment store request failed: {}", err);
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_if_absent(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.api_key),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => {
                    warn!("Insert of appointment {} hit the active slot index", appointment.id);
                    StoreError::Conflict
                }
                other => unavailable(other),
            })?;

        let stored = result
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Unavailable("Insert returned no row".to_string()))?;

        info!("Stored appointment {}", stored.id);
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        debug!("Fetching appointment {}", id);
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn list_active_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&{}",
            urlencoding::encode(patient_id),
            ACTIVE_ORDER
        );
        self.select(&path).await
    }

    async fn list_active_for_doctor(
        &self,
        doctor_id: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&{}",
            urlencoding::encode(doctor_id),
            ACTIVE_ORDER
        );
        self.select(&path).await
    }

    async fn cancel(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, StoreError> {
        self.update_active(
            id,
            json!({
                "status": AppointmentStatus::Cancelled,
                "cancelled_at": at.to_rfc3339(),
                "updated_at": at.to_rfc3339()
            }),
        )
        .await
    }

    async fn save_notes(
        &self,
        id: Uuid,
        notes: String,
        at: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.update_active(
            id,
            json!({
                "notes": notes,
                "updated_at": at.to_rfc3339()
            }),
        )
        .await
    }
}
