use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::info;

use appointment_cell::services::{
    clinic_offset, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use appointment_cell::{appointment_routes, AppointmentState};
use doctor_cell::models::DirectoryError;
use doctor_cell::services::{DoctorDirectory, StaticDoctorDirectory, SupabaseDoctorDirectory};
use doctor_cell::{doctor_routes, DoctorState};
use patient_cell::services::{InMemoryPatientRegistry, PatientRegistry, SupabasePatientRegistry};
use patient_cell::{patient_routes, PatientState};
use shared_config::{AppConfig, StorageBackend};

/// Backends shared by the cells, chosen once at startup.
pub struct Collaborators {
    pub directory: Arc<dyn DoctorDirectory>,
    pub store: Arc<dyn AppointmentStore>,
    pub patients: Arc<dyn PatientRegistry>,
}

impl Collaborators {
    pub fn from_config(config: &AppConfig) -> Result<Self, DirectoryError> {
        let directory: Arc<dyn DoctorDirectory> =
            match (&config.doctor_directory_path, config.storage_backend) {
                (Some(path), _) => Arc::new(StaticDoctorDirectory::from_json_file(path)?),
                (None, StorageBackend::Supabase) => Arc::new(SupabaseDoctorDirectory::new(config)),
                (None, StorageBackend::Memory) => Arc::new(StaticDoctorDirectory::seeded()),
            };

        let (store, patients): (Arc<dyn AppointmentStore>, Arc<dyn PatientRegistry>) =
            match config.storage_backend {
                StorageBackend::Supabase => (
                    Arc::new(SupabaseAppointmentStore::new(config)),
                    Arc::new(SupabasePatientRegistry::new(config)),
                ),
                StorageBackend::Memory => (
                    Arc::new(InMemoryAppointmentStore::new()),
                    Arc::new(InMemoryPatientRegistry::new()),
                ),
            };

        info!("Using {:?} storage backend", config.storage_backend);
        Ok(Self {
            directory,
            store,
            patients,
        })
    }
}

pub fn create_router(config: Arc<AppConfig>, collaborators: Collaborators) -> Router {
    let Collaborators {
        directory,
        store,
        patients,
    } = collaborators;

    let appointment_state = AppointmentState::new(
        directory.clone(),
        store,
        patients.clone(),
        clinic_offset(config.clinic_utc_offset_minutes),
    );

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(DoctorState::new(directory)))
        .nest("/patients", patient_routes(config.clone(), PatientState::new(patients)))
        .nest("/appointments", appointment_routes(config, appointment_state))
}
