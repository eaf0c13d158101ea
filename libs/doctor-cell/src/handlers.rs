use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{Doctor, OffersQuery, OffersResponse};
use crate::router::DoctorState;
use crate::services::slots::{format_slot_time, SlotAllocator};

#[axum::debug_handler]
pub async fn list_doctors(State(state): State<DoctorState>) -> Result<Json<Value>, AppError> {
    let doctors = state.directory.list_doctors().await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = state
        .directory
        .get_doctor(&doctor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(doctor))
}

#[axum::debug_handler]
pub async fn get_offers(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<OffersQuery>,
) -> Result<Json<OffersResponse>, AppError> {
    let date = NaiveDate::parse_from_str(query.date.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation {
            reason: "malformed-date".to_string(),
            message: format!("'{}' is not a YYYY-MM-DD date", query.date),
        }
    })?;

    let doctor = state
        .directory
        .get_doctor(&doctor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    let times: Vec<String> = SlotAllocator::offers_for(&doctor, date)
        .into_iter()
        .map(format_slot_time)
        .collect();

    debug!("Doctor {} offers {} times on {}", doctor_id, times.len(), date);

    Ok(Json(OffersResponse {
        doctor_id,
        date,
        times,
    }))
}
