use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::FixedOffset;

use doctor_cell::services::DoctorDirectory;
use patient_cell::services::PatientRegistry;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AppointmentStore, BookingService, LifecycleService, ProjectionService};

#[derive(Clone)]
pub struct AppointmentState {
    pub booking: Arc<BookingService>,
    pub lifecycle: Arc<LifecycleService>,
    pub projection: Arc<ProjectionService>,
}

impl AppointmentState {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        store: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientRegistry>,
        clinic_offset: FixedOffset,
    ) -> Self {
        Self {
            booking: Arc::new(BookingService::new(directory.clone(), store.clone(), clinic_offset)),
            lifecycle: Arc::new(LifecycleService::new(store.clone())),
            projection: Arc::new(ProjectionService::new(directory, patients, store)),
        }
    }
}

pub fn appointment_routes(config: Arc<AppConfig>, state: AppointmentState) -> Router {
    // Every appointment operation requires authentication
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/doctor", get(handlers::list_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/notes", put(handlers::save_appointment_notes))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
