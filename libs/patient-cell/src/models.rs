use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const MAX_PATIENT_AGE: u32 = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Patient context shown to the doctor of a booked appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    /// Auth subject id of the patient.
    pub id: String,
    pub name: String,
    pub email: String,
    pub health: Option<HealthSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
}

impl HealthSummary {
    pub fn validate(&self) -> Result<(), PatientError> {
        if let Some(age) = self.age {
            if age > MAX_PATIENT_AGE {
                return Err(PatientError::ValidationError(format!(
                    "age must be at most {}",
                    MAX_PATIENT_AGE
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), PatientError> {
        if self.name.trim().is_empty() {
            return Err(PatientError::ValidationError("name is required".to_string()));
        }
        if !is_valid_email(self.email.trim()) {
            return Err(PatientError::ValidationError(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH
        && email_pattern().is_some_and(|pattern| pattern.is_match(email))
}

/// Key under which an email is unique: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
pub struct RegisterPatientRequest {
    pub name: String,
    /// Defaults to the email claim of the caller's token.
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("Patient {id} is already registered")]
    AlreadyRegistered { id: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        let message = err.to_string();
        match err {
            PatientError::NotFound => AppError::NotFound(message),
            PatientError::EmailAlreadyExists { .. } => AppError::Conflict {
                reason: "email-already-exists".to_string(),
                message,
            },
            PatientError::AlreadyRegistered { .. } => AppError::Conflict {
                reason: "already-registered".to_string(),
                message,
            },
            PatientError::ValidationError(_) => AppError::Validation {
                reason: "invalid-profile".to_string(),
                message,
            },
            PatientError::DatabaseError(_) => AppError::ExternalService(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_patient(name: &str, email: &str) -> NewPatient {
        NewPatient {
            id: "p-1".to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn validates_registration_fields() {
        assert!(new_patient("Jane Doe", "jane@example.com").validate().is_ok());
        assert!(new_patient("  ", "jane@example.com").validate().is_err());
        assert!(new_patient("Jane", "jane.example.com").validate().is_err());
        assert!(new_patient("Jane", "jane @example.com").validate().is_err());
        assert!(new_patient("Jane", "jane@.").validate().is_err());
        assert!(new_patient("Jane", "jane@example.").validate().is_err());
        assert!(new_patient("Jane", "jane@@example.com").validate().is_err());
        assert!(new_patient("Jane", "@example.com").validate().is_err());

        let too_long = format!("{}@example.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert!(new_patient("Jane", &too_long).validate().is_err());
    }

    #[test]
    fn normalizes_email_for_uniqueness() {
        assert_eq!(normalize_email("  JANE@Example.com "), "jane@example.com");
    }

    #[test]
    fn rejects_implausible_age() {
        let summary = HealthSummary {
            age: Some(151),
            ..HealthSummary::default()
        };
        assert!(summary.validate().is_err());
        assert!(HealthSummary::default().validate().is_ok());
    }
}
