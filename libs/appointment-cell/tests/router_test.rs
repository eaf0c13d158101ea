use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::services::{clinic_offset, InMemoryAppointmentStore};
use appointment_cell::{appointment_routes, AppointmentState};
use doctor_cell::models::{DaySlot, Doctor};
use doctor_cell::services::StaticDoctorDirectory;
use patient_cell::models::{HealthSummary, NewPatient};
use patient_cell::services::{InMemoryPatientRegistry, PatientRegistry};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

const DOCTOR_ID: &str = "3";

fn next_week() -> NaiveDate {
    (Utc::now() + Duration::days(7)).date_naive()
}

fn doctor() -> Doctor {
    Doctor {
        id: DOCTOR_ID.to_string(),
        name: "Dr. Richard James".to_string(),
        specialty: "Diabetologist".to_string(),
        qualification: "MD, DM (Endocrinology)".to_string(),
        experience_years: 12,
        about: None,
        image_url: None,
        fee: 80,
        verified: true,
        video_link: "https://meet.example.com/rjames".to_string(),
        day_slots: vec![DaySlot {
            date: next_week(),
            times: vec!["10:00 AM".to_string(), "2:00 PM".to_string()],
            available: true,
        }],
    }
}

struct TestApp {
    router: Router,
    secret: String,
    patients: Arc<InMemoryPatientRegistry>,
}

impl TestApp {
    fn new() -> Self {
        let config = TestConfig::default();
        let patients = Arc::new(InMemoryPatientRegistry::new());
        let directory = StaticDoctorDirectory::new(vec![doctor()]).unwrap();
        let state = AppointmentState::new(
            Arc::new(directory),
            Arc::new(InMemoryAppointmentStore::new()),
            patients.clone(),
            clinic_offset(0),
        );

        Self {
            router: Router::new().nest("/appointments", appointment_routes(config.to_arc(), state)),
            secret: config.jwt_secret,
            patients,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            let token = JwtTestUtils::create_test_token(user, &self.secret, None);
            builder = builder.header(header::AUTHORIZATION, JwtTestUtils::bearer(&token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn book(&self, patient: &TestUser, time: &str) -> (StatusCode, Value) {
        let body = json!({
            "doctor_id": DOCTOR_ID,
            "date": next_week().format("%Y-%m-%d").to_string(),
            "time": time,
            "appointment_type": "Diabetes Consultation"
        });
        self.send(Method::POST, "/appointments", Some(patient), Some(body)).await
    }
}

fn the_doctor() -> TestUser {
    TestUser::doctor_with_id(DOCTOR_ID, "rjames@example.com")
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/appointments/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_expired_token(&patient, &app.secret);
    let request = Request::builder()
        .uri("/appointments/mine")
        .header(header::AUTHORIZATION, JwtTestUtils::bearer(&token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn book_then_conflict_over_http() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let bob = TestUser::patient("bob@example.com");

    let (status, booked) = app.book(&alice, "10:00 AM").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booked["status"], "upcoming");
    assert_eq!(booked["patient_id"], alice.id);
    assert_eq!(booked["video_link"], "https://meet.example.com/rjames");

    let (status, body) = app.book(&bob, "10:00 AM").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already-booked");

    let (status, body) = app.book(&bob, "11:00 AM").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "slot-unavailable");
}

#[tokio::test]
async fn doctors_cannot_book_or_cancel() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let (status, _) = app.book(&the_doctor(), "10:00 AM").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, booked) = app.book(&alice, "10:00 AM").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::POST, &format!("/appointments/{}/cancel", id), Some(&the_doctor()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn patient_list_and_cancel_flow() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    app.book(&alice, "2:00 PM").await;
    let (_, booked) = app.book(&alice, "10:00 AM").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, mine) = app.send(Method::GET, "/appointments/mine", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["total"], 2);
    assert_eq!(mine["appointments"][0]["time"], "10:00 AM");
    assert_eq!(mine["appointments"][0]["can_cancel"], true);
    assert_eq!(mine["appointments"][0]["title"], "Diabetes Consultation with Dr. Richard James");

    let (status, cancelled) = app
        .send(Method::POST, &format!("/appointments/{}/cancel", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["can_cancel"], false);

    let (_, mine) = app.send(Method::GET, "/appointments/mine", Some(&alice), None).await;
    assert_eq!(mine["total"], 1);

    let (status, body) = app
        .send(Method::POST, &format!("/appointments/{}/cancel", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not-found");
}

#[tokio::test]
async fn doctor_sees_patient_context_and_writes_notes() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    app.patients
        .register(NewPatient {
            id: alice.id.clone(),
            name: "Alice Moreau".to_string(),
            email: alice.email.clone(),
        })
        .await
        .unwrap();
    app.patients
        .update_health(
            &alice.id,
            HealthSummary {
                age: Some(61),
                gender: Some("female".to_string()),
                medical_history: Some("Type 2 diabetes, hypertension".to_string()),
            },
        )
        .await
        .unwrap();

    let (_, booked) = app.book(&alice, "10:00 AM").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, notes) = app
        .send(
            Method::PUT,
            &format!("/appointments/{}/notes", id),
            Some(&the_doctor()),
            Some(json!({ "notes": "Adjust metformin dose" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(notes["notes"], "Adjust metformin dose");

    let (status, list) = app
        .send(Method::GET, "/appointments/doctor", Some(&the_doctor()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let view = &list["appointments"][0];
    assert_eq!(view["patient"]["name"], "Alice Moreau");
    assert_eq!(view["patient"]["age"], 61);
    assert_eq!(view["patient"]["medical_history"], "Type 2 diabetes, hypertension");
    assert_eq!(view["notes"], "Adjust metformin dose");
    assert_eq!(view["can_join_video"], true);

    let (status, patient_view) = app
        .send(Method::GET, &format!("/appointments/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(patient_view.get("notes").is_none());
}

#[tokio::test]
async fn other_doctor_is_forbidden() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let stranger = TestUser::doctor_with_id("4", "sjohnson@example.com");

    let (_, booked) = app.book(&alice, "10:00 AM").await;
    let id = booked["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/appointments/{}/notes", id),
            Some(&stranger),
            Some(json!({ "notes": "not my patient" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, &format!("/appointments/{}", id), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app.send(Method::GET, "/appointments/doctor", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn patient_cannot_list_doctor_schedule_or_write_notes() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let (status, _) = app.send(Method::GET, "/appointments/doctor", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, booked) = app.book(&alice, "10:00 AM").await;
    let id = booked["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/appointments/{}/notes", id),
            Some(&alice),
            Some(json!({ "notes": "self note" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_appointment_id_is_not_found() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let (status, _) = app.send(Method::GET, "/appointments/not-a-uuid", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/appointments/{}/cancel", uuid::Uuid::new_v4()),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
