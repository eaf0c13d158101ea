use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{Appointment, BookAppointmentRequest, DoctorView, PatientView, SaveNotesRequest};
use crate::router::AppointmentState;

fn parse_appointment_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Appointment not found".to_string()))
}

fn first<T>(mut views: Vec<T>) -> Result<T, AppError> {
    views
        .pop()
        .ok_or_else(|| AppError::Internal("Projection produced no view".to_string()))
}

/// Returns the stored record, whose status is `upcoming` at creation.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    require_role(&user, Role::Patient)?;

    let appointment = state.booking.book(&user.id, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    let now = Utc::now();
    let appointments = state.lifecycle.list_for_patient(&user.id, now).await?;
    let views = state.projection.patient_views(&appointments, now).await?;

    Ok(Json(json!({
        "appointments": views,
        "total": views.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let now = Utc::now();
    let appointments = state.lifecycle.list_for_doctor(&user.id, now).await?;
    let views = state.projection.doctor_views(&appointments, now).await?;

    Ok(Json(json!({
        "appointments": views,
        "total": views.len()
    })))
}

/// Projects the appointment for the caller's role.
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_appointment_id(&appointment_id)?;
    let now = Utc::now();
    let appointment = state.lifecycle.get_for(id, &user, now).await?;

    let view = if user.has_role(Role::Doctor) {
        json!(first(state.projection.doctor_views(&[appointment], now).await?)?)
    } else {
        json!(first(state.projection.patient_views(&[appointment], now).await?)?)
    };

    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<PatientView>, AppError> {
    require_role(&user, Role::Patient)?;

    let id = parse_appointment_id(&appointment_id)?;
    let now = Utc::now();
    let cancelled = state.lifecycle.cancel(id, &user.id, now).await?;
    let view = first(state.projection.patient_views(&[cancelled], now).await?)?;

    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn save_appointment_notes(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<SaveNotesRequest>,
) -> Result<Json<DoctorView>, AppError> {
    require_role(&user, Role::Doctor)?;

    let id = parse_appointment_id(&appointment_id)?;
    let now = Utc::now();
    let saved = state
        .projection
        .save_notes(id, &user.id, request.notes, now)
        .await?;
    let view = first(state.projection.doctor_views(&[saved], now).await?)?;

    Ok(Json(view))
}
