use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

pub const APPOINTMENT_DURATION_MINUTES: i64 = 60;
pub const MAX_NOTES_LENGTH: usize = 10_000;

/// `Completed` is never stored; it is derived from the start time when read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: String,
    pub doctor_name: String,
    pub video_link: String,
    pub patient_id: String,
    pub appointment_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id.clone(),
            date: self.date,
            time: self.time,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == AppointmentStatus::Cancelled
    }

    /// Lifecycle status as seen at `now`.
    pub fn derived_status(&self, now: DateTime<Utc>) -> AppointmentStatus {
        if self.is_cancelled() {
            AppointmentStatus::Cancelled
        } else if self.start_time > now {
            AppointmentStatus::Upcoming
        } else {
            AppointmentStatus::Completed
        }
    }
}

/// At most one active appointment may hold a given key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `h:mm AM/PM` or `HH:MM`
    pub time: String,
    pub appointment_type: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveNotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub qualification: Option<String>,
    pub image_url: Option<String>,
}

/// What the booking patient sees. Never carries doctor notes.
#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    pub id: Uuid,
    pub title: String,
    pub doctor: DoctorSummary,
    pub appointment_type: String,
    pub date: NaiveDate,
    pub time: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub video_link: String,
    pub can_cancel: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientContext {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub medical_history: String,
}

/// What the assigned doctor sees.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    pub id: Uuid,
    pub patient: PatientContext,
    pub appointment_type: String,
    pub date: NaiveDate,
    pub time: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub video_link: String,
    pub notes: Option<String>,
    pub can_join_video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    MissingType,
    MalformedDate,
    MalformedTime,
    UnknownDoctor,
    SlotUnavailable,
    NotesTooLong,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::MissingType => "missing-type",
            ValidationReason::MalformedDate => "malformed-date",
            ValidationReason::MalformedTime => "malformed-time",
            ValidationReason::UnknownDoctor => "unknown-doctor",
            ValidationReason::SlotUnavailable => "slot-unavailable",
            ValidationReason::NotesTooLong => "notes-too-long",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("{message}")]
    Validation {
        reason: ValidationReason,
        message: String,
    },

    #[error("This time is already booked, please pick another time")]
    AlreadyBooked,

    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Appointment store error: {0}")]
    Store(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppointmentError {
    pub fn validation(reason: ValidationReason, message: impl Into<String>) -> Self {
        AppointmentError::Validation {
            reason,
            message: message.into(),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::Validation { reason, .. } => AppError::Validation {
                reason: reason.as_str().to_string(),
                message,
            },
            AppointmentError::AlreadyBooked => AppError::Conflict {
                reason: "already-booked".to_string(),
                message,
            },
            AppointmentError::NotFound => AppError::NotFound(message),
            AppointmentError::Forbidden(_) => AppError::Forbidden(message),
            AppointmentError::Store(_) | AppointmentError::ExternalService(_) => {
                AppError::ExternalService(message)
            }
        }
    }
}
