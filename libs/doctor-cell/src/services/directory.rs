use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DaySlot, DirectoryError, Doctor};

/// Read-only source of doctor profiles and their declared day slots.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// All doctors in declared order.
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError>;

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>, DirectoryError>;
}

/// Directory held in memory, loaded once at startup.
#[derive(Debug)]
pub struct StaticDoctorDirectory {
    doctors: Vec<Doctor>,
}

impl StaticDoctorDirectory {
    pub fn new(doctors: Vec<Doctor>) -> Result<Self, DirectoryError> {
        let mut seen = HashSet::new();
        for doctor in &doctors {
            if !seen.insert(doctor.id.as_str()) {
                return Err(DirectoryError::InvalidData(format!(
                    "duplicate doctor id '{}'",
                    doctor.id
                )));
            }
        }

        Ok(Self { doctors })
    }

    /// Loads a JSON array of doctors.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let doctors: Vec<Doctor> = serde_json::from_str(&raw)
            .map_err(|e| DirectoryError::InvalidData(e.to_string()))?;

        info!("Loaded {} doctors from {}", doctors.len(), path.display());
        Self::new(doctors)
    }

    /// The clinic's built-in directory.
    pub fn seeded() -> Self {
        Self {
            doctors: seed_doctors(),
        }
    }
}

#[async_trait]
impl DoctorDirectory for StaticDoctorDirectory {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        Ok(self.doctors.clone())
    }

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>, DirectoryError> {
        debug!("Looking up doctor {}", doctor_id);
        Ok(self.doctors.iter().find(|d| d.id == doctor_id).cloned())
    }
}

/// Directory backed by the `doctors` table with embedded `day_slots`.
pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
    api_key: String,
}

const DOCTOR_SELECT: &str = "select=*,day_slots(date,times,available)";

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            api_key: config.supabase_store_key().to_string(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Doctor>, DirectoryError> {
        self.supabase
            .request(Method::GET, path, Some(&self.api_key), None)
            .await
            .map_err(|e| {
                error!("Failed to fetch doctors: {}", e);
                DirectoryError::Unavailable(e.to_string())
            })
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn list_doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        let path = format!("/rest/v1/doctors?{}&order=id.asc", DOCTOR_SELECT);
        self.fetch(&path).await
    }

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>, DirectoryError> {
        debug!("Fetching doctor {}", doctor_id);
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&{}",
            urlencoding::encode(doctor_id),
            DOCTOR_SELECT
        );
        Ok(self.fetch(&path).await?.into_iter().next())
    }
}

fn seed_doctors() -> Vec<Doctor> {
    vec![
        seed_doctor(
            "3",
            "Dr. Richard James",
            "Diabetologist",
            "MD, DM (Endocrinology)",
            12,
            "Dr. James is a renowned diabetologist with extensive experience in managing complex diabetes cases.",
            "https://images.unsplash.com/photo-1612349317150-e413f6a5b16d?auto=format&fit=crop&w=2340&q=80",
            80,
            "https://gsumeetings.webex.com/meet/rnarra2",
            &[("2025-03-23", &["10:00 AM", "2:00 PM"]), ("2025-03-24", &["11:00 AM"])],
        ),
        seed_doctor(
            "4",
            "Dr. Sarah Johnson",
            "Endocrinologist",
            "MD, DM (Endocrinology)",
            15,
            "Dr. Johnson specializes in diabetes management and metabolic disorders. She uses the latest treatment protocols and technology to offer personalized care.",
            "https://images.unsplash.com/photo-1607746882042-944635dfe10e?auto=format&fit=crop&w=2340&q=80",
            90,
            "https://gsumeetings.webex.com/meet/mkalyanam1",
            &[("2025-03-23", &["11:00 AM", "1:30 PM"]), ("2025-03-24", &["2:00 PM", "4:30 PM"])],
        ),
        seed_doctor(
            "5",
            "Dr. Michael Chen",
            "Diabetologist",
            "MBBS, Fellowship in Diabetology",
            8,
            "Dr. Chen focuses on managing type 1 and type 2 diabetes, with expertise in insulin pumps and continuous glucose monitoring.",
            "https://images.unsplash.com/photo-1537368910025-700350fe46c7?auto=format&fit=crop&w=2340&q=80",
            75,
            "https://gsumeetings.webex.com/meet/ckasanagottu1",
            &[("2025-03-23", &["10:30 AM", "3:00 PM"]), ("2025-03-24", &["11:00 AM"])],
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn seed_doctor(
    id: &str,
    name: &str,
    specialty: &str,
    qualification: &str,
    experience_years: u32,
    about: &str,
    image_url: &str,
    fee: u32,
    video_link: &str,
    open_days: &[(&str, &[&str])],
) -> Doctor {
    let mut day_slots: Vec<DaySlot> = open_days
        .iter()
        .filter_map(|(date, times)| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").ok().map(|date| DaySlot {
                date,
                times: times.iter().map(|t| t.to_string()).collect(),
                available: true,
            })
        })
        .collect();

    // Every seeded doctor is unavailable on the 25th.
    if let Some(closed) = NaiveDate::from_ymd_opt(2025, 3, 25) {
        day_slots.push(DaySlot {
            date: closed,
            times: Vec::new(),
            available: false,
        });
    }

    Doctor {
        id: id.to_string(),
        name: name.to_string(),
        specialty: specialty.to_string(),
        qualification: qualification.to_string(),
        experience_years,
        about: Some(about.to_string()),
        image_url: Some(image_url.to_string()),
        fee,
        verified: true,
        video_link: video_link.to_string(),
        day_slots,
    }
}
