use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{HealthSummary, NewPatient, PatientProfile, RegisterPatientRequest};
use crate::router::PatientState;

#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<PatientState>,
    Extension(user): Extension<User>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<(StatusCode, Json<PatientProfile>), AppError> {
    let email = request
        .email
        .or(user.email)
        .ok_or_else(|| AppError::Validation {
            reason: "invalid-profile".to_string(),
            message: "email is required".to_string(),
        })?;

    let profile = state
        .registry
        .register(NewPatient {
            id: user.id,
            name: request.name,
            email,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<PatientState>,
    Extension(user): Extension<User>,
) -> Result<Json<PatientProfile>, AppError> {
    let profile = state
        .registry
        .get_profile(&user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))?;

    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn update_my_health(
    State(state): State<PatientState>,
    Extension(user): Extension<User>,
    Json(health): Json<HealthSummary>,
) -> Result<Json<PatientProfile>, AppError> {
    require_role(&user, Role::Patient)?;

    let profile = state.registry.update_health(&user.id, health).await?;
    Ok(Json(profile))
}
