use std::sync::Arc;

use axum::{middleware, routing::{get, post, put}, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::PatientRegistry;

#[derive(Clone)]
pub struct PatientState {
    pub registry: Arc<dyn PatientRegistry>,
}

impl PatientState {
    pub fn new(registry: Arc<dyn PatientRegistry>) -> Self {
        Self { registry }
    }
}

pub fn patient_routes(config: Arc<AppConfig>, state: PatientState) -> Router {
    Router::new()
        .route("/register", post(register_patient))
        .route("/me", get(get_my_profile))
        .route("/me/health", put(update_my_health))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
