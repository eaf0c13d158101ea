use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::services::{AppointmentStore, StoreError, SupabaseAppointmentStore};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const APPOINTMENT_ID: &str = "5b0f1c2e-8a43-4d7e-9f61-2c3b4a5d6e7f";

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    SupabaseAppointmentStore::new(&config)
}

fn new_appointment() -> Appointment {
    let start_time = Utc.with_ymd_and_hms(2025, 3, 23, 10, 0, 0).unwrap();
    Appointment {
        id: Uuid::parse_str(APPOINTMENT_ID).unwrap(),
        doctor_id: "3".to_string(),
        doctor_name: "Dr. Richard James".to_string(),
        video_link: "https://meet.example.com/rjames".to_string(),
        patient_id: "p-1".to_string(),
        appointment_type: "Diabetes Consultation".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 3, 23).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        start_time,
        end_time: start_time + Duration::hours(1),
        status: AppointmentStatus::Upcoming,
        notes: None,
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        cancelled_at: None,
    }
}

#[tokio::test]
async fn insert_posts_row_and_returns_representation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "doctor_id": "3",
            "date": "2025-03-23",
            "time": "10:00:00",
            "status": "upcoming"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(APPOINTMENT_ID, "p-1", "3", "upcoming")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store_for(&server).insert_if_absent(new_appointment()).await.unwrap();
    assert_eq!(stored.id.to_string(), APPOINTMENT_ID);
    assert_eq!(stored.status, AppointmentStatus::Upcoming);
}

#[tokio::test]
async fn unique_index_violation_is_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"appointments_active_slot_idx\"",
                "23505",
            ),
        ))
        .mount(&server)
        .await;

    assert_matches!(
        store_for(&server).insert_if_absent(new_appointment()).await,
        Err(StoreError::Conflict)
    );
}

#[tokio::test]
async fn cancel_is_conditional_on_active_status() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", APPOINTMENT_ID)))
        .and(query_param("status", "eq.upcoming"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(APPOINTMENT_ID, "p-1", "3", "cancelled")
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let id = Uuid::parse_str(APPOINTMENT_ID).unwrap();

    let cancelled = store.cancel(id, Utc::now()).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert_matches!(store.cancel(id, Utc::now()).await, Err(StoreError::NotFound));
}

#[tokio::test]
async fn lists_active_appointments_for_patient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", "eq.p-1"))
        .and(query_param("status", "neq.cancelled"))
        .and(query_param("order", "start_time.asc,created_at.asc,id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(APPOINTMENT_ID, "p-1", "3", "upcoming")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let list = store_for(&server).list_active_for_patient("p-1").await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].patient_id, "p-1");
}

#[tokio::test]
async fn store_outage_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_matches!(
        store_for(&server).list_active_for_doctor("3").await,
        Err(StoreError::Unavailable(_))
    );
}
