use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{normalize_email, HealthSummary, NewPatient, PatientError, PatientProfile};

/// Store of patient profiles keyed by auth subject id. Emails are unique.
#[async_trait]
pub trait PatientRegistry: Send + Sync {
    async fn register(&self, patient: NewPatient) -> Result<PatientProfile, PatientError>;

    async fn get_profile(&self, patient_id: &str) -> Result<Option<PatientProfile>, PatientError>;

    async fn update_health(
        &self,
        patient_id: &str,
        health: HealthSummary,
    ) -> Result<PatientProfile, PatientError>;
}

#[derive(Default)]
struct RegistryState {
    profiles: HashMap<String, PatientProfile>,
    /// Normalized email to patient id.
    emails: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryPatientRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryPatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatientRegistry for InMemoryPatientRegistry {
    async fn register(&self, patient: NewPatient) -> Result<PatientProfile, PatientError> {
        patient.validate()?;

        let email = normalize_email(&patient.email);
        let mut state = self.state.write().await;

        if state.profiles.contains_key(&patient.id) {
            return Err(PatientError::AlreadyRegistered { id: patient.id });
        }
        if state.emails.contains_key(&email) {
            warn!("Registration rejected, email already in use");
            return Err(PatientError::EmailAlreadyExists { email: patient.email });
        }

        let profile = PatientProfile {
            id: patient.id,
            name: patient.name.trim().to_string(),
            email: email.clone(),
            health: None,
            created_at: Utc::now(),
        };

        state.emails.insert(email, profile.id.clone());
        state.profiles.insert(profile.id.clone(), profile.clone());

        info!("Registered patient {}", profile.id);
        Ok(profile)
    }

    async fn get_profile(&self, patient_id: &str) -> Result<Option<PatientProfile>, PatientError> {
        Ok(self.state.read().await.profiles.get(patient_id).cloned())
    }

    async fn update_health(
        &self,
        patient_id: &str,
        health: HealthSummary,
    ) -> Result<PatientProfile, PatientError> {
        health.validate()?;

        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(patient_id)
            .ok_or(PatientError::NotFound)?;

        profile.health = Some(health);
        debug!("Updated health summary for patient {}", patient_id);
        Ok(profile.clone())
    }
}

/// Registry backed by the `patients` table. Emails are stored normalized and the
/// table carries a unique index on `lower(email)`; a 409 on insert is either that
/// index or the primary key.
pub struct SupabasePatientRegistry {
    supabase: SupabaseClient,
    api_key: String,
}

impl SupabasePatientRegistry {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            api_key: config.supabase_store_key().to_string(),
        }
    }
}

fn database_error(err: SupabaseError) -> PatientError {
    error!("Patient registry request failed: {}", err);
    PatientError::DatabaseError(err.to_string())
}

#[async_trait]
impl PatientRegistry for SupabasePatientRegistry {
    async fn register(&self, patient: NewPatient) -> Result<PatientProfile, PatientError> {
        patient.validate()?;

        if self.get_profile(&patient.id).await?.is_some() {
            return Err(PatientError::AlreadyRegistered { id: patient.id });
        }

        let email = normalize_email(&patient.email);
        let body = json!({
            "id": patient.id,
            "name": patient.name.trim(),
            "email": email,
            "health": null,
            "created_at": Utc::now().to_rfc3339()
        });

        let inserted: Result<Vec<PatientProfile>, SupabaseError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                Some(&self.api_key),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await;

        let result = match inserted {
            Ok(rows) => rows,
            Err(SupabaseError::Conflict(_)) => {
                // A concurrent registration of the same subject also lands here.
                if self.get_profile(&patient.id).await?.is_some() {
                    return Err(PatientError::AlreadyRegistered { id: patient.id });
                }
                warn!("Registration rejected, email already in use");
                return Err(PatientError::EmailAlreadyExists { email });
            }
            Err(other) => return Err(database_error(other)),
        };

        let profile = result.into_iter().next().ok_or_else(|| {
            PatientError::DatabaseError("Failed to create patient profile".to_string())
        })?;

        info!("Registered patient {}", profile.id);
        Ok(profile)
    }

    async fn get_profile(&self, patient_id: &str) -> Result<Option<PatientProfile>, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let result: Vec<PatientProfile> = self
            .supabase
            .request(Method::GET, &path, Some(&self.api_key), None)
            .await
            .map_err(database_error)?;

        Ok(result.into_iter().next())
    }

    async fn update_health(
        &self,
        patient_id: &str,
        health: HealthSummary,
    ) -> Result<PatientProfile, PatientError> {
        health.validate()?;

        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let result: Vec<PatientProfile> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.api_key),
                Some(json!({ "health": health })),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(database_error)?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }
}
