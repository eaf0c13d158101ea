use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::services::DoctorDirectory;

#[derive(Clone)]
pub struct DoctorState {
    pub directory: Arc<dyn DoctorDirectory>,
}

impl DoctorState {
    pub fn new(directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { directory }
    }
}

/// Directory routes are public; no token is required to browse doctors.
pub fn doctor_routes(state: DoctorState) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/offers", get(handlers::get_offers))
        .with_state(state)
}
