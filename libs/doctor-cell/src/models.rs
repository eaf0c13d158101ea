use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub qualification: String,
    pub experience_years: u32,
    pub about: Option<String>,
    pub image_url: Option<String>,
    pub fee: u32,
    pub verified: bool,
    /// Conferencing address copied into every appointment booked with this doctor.
    pub video_link: String,
    #[serde(default)]
    pub day_slots: Vec<DaySlot>,
}

/// Times a doctor offers on one calendar date.
///
/// When `available` is false the listed times are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlot {
    pub date: NaiveDate,
    #[serde(default)]
    pub times: Vec<String>,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct OffersQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct OffersResponse {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub times: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Doctor directory unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid doctor directory data: {0}")]
    InvalidData(String),

    #[error("Failed to read doctor directory file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Io { .. } => AppError::Internal(err.to_string()),
            DirectoryError::Unavailable(_) | DirectoryError::InvalidData(_) => {
                AppError::ExternalService(err.to_string())
            }
        }
    }
}
