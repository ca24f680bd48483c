use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::appointment_routes;
use appointment_cell::models::{Doctor, Patient, SlotLedger};
use appointment_cell::services::{AppointmentBookingService, InMemoryAppointmentStore};
use shared_utils::extractor::LEGACY_TOKEN_HEADER;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    config: TestConfig,
    doctor_id: Uuid,
    alice: TestUser,
    bob: TestUser,
}

fn seed_patient(id: Uuid, name: &str) -> Patient {
    Patient {
        id,
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        phone: None,
        image: None,
        address: json!({}),
        gender: None,
        dob: None,
    }
}

async fn setup() -> TestApp {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryAppointmentStore::new());

    let doctor_id = Uuid::new_v4();
    store
        .insert_doctor(Doctor {
            id: doctor_id,
            name: "Dr. Emily Larson".to_string(),
            email: Some("emily@example.com".to_string()),
            speciality: Some("Gynecologist".to_string()),
            degree: Some("MBBS".to_string()),
            experience: Some("3 Years".to_string()),
            about: None,
            image: None,
            address: json!({}),
            available: true,
            fees: 500,
            slots_booked: SlotLedger::new(),
        })
        .await;

    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();
    store.insert_patient(seed_patient(alice_id, "Alice")).await;
    store.insert_patient(seed_patient(bob_id, "Bob")).await;

    let booking = Arc::new(AppointmentBookingService::new(store));
    let router = appointment_routes(config.to_arc(), booking);

    TestApp {
        router,
        config,
        doctor_id,
        alice: TestUser::with_id(alice_id, "alice@example.com"),
        bob: TestUser::with_id(bob_id, "bob@example.com"),
    }
}

impl TestApp {
    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token(user)))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token(user)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn book(&self, user: &TestUser, time: &str) -> (StatusCode, Value) {
        self.post(
            "/",
            user,
            json!({ "docId": self.doctor_id, "slotDate": "2024-05-01", "slotTime": time }),
        )
        .await
    }
}

#[tokio::test]
async fn test_book_appointment_success() {
    let app = setup().await;

    let (status, body) = app.book(&app.alice, "10:00").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["amount"], 500);
    assert_eq!(body["appointment"]["slot_time"], "10:00");
    assert_eq!(body["appointment"]["cancelled"], false);
    assert_eq!(body["appointment"]["payment"], false);
    assert_eq!(body["appointment"]["patient_id"], app.alice.id);
}

#[tokio::test]
async fn test_book_taken_slot_returns_conflict() {
    let app = setup().await;

    app.book(&app.alice, "10:00").await;
    let (status, body) = app.book(&app.bob, "10:00").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_book_rejects_malformed_slot() {
    let app = setup().await;

    let (status, body) = app.book(&app.alice, "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_malformed_input_returns_typed_validation_error() {
    let app = setup().await;

    let (status, body) = app
        .post(
            "/",
            &app.alice,
            json!({ "docId": "not-a-uuid", "slotDate": "2024-05-01", "slotTime": "10:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app.post("/not-a-uuid/cancel", &app.alice, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = app.get("/not-a-uuid", &app.alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", app.token(&app.alice)))
        .header("Content-Type", "application/json")
        .body(Body::from("{\"docId\":"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_book_requires_authentication() {
    let app = setup().await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({ "docId": app.doctor_id, "slotDate": "2024-05-01", "slotTime": "10:00" }).to_string(),
        ))
        .unwrap();
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = setup().await;
    let token = JwtTestUtils::create_expired_token(&app.alice, &app.config.jwt_secret);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_legacy_token_header_is_accepted() {
    let app = setup().await;

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header(LEGACY_TOKEN_HEADER, app.token(&app.alice))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointments"], json!([]));
}

#[tokio::test]
async fn test_cancel_by_other_patient_is_forbidden() {
    let app = setup().await;

    let (_, booked) = app.book(&app.alice, "10:00").await;
    let appointment_id = booked["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&format!("/{}/cancel", appointment_id), &app.bob, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "unauthorized");

    // Slot is still held.
    let (status, _) = app.book(&app.bob, "10:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_then_rebook_through_routes() {
    let app = setup().await;

    let (_, booked) = app.book(&app.alice, "10:00").await;
    let appointment_id = booked["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/cancel", &app.alice, json!({ "appointmentId": appointment_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["cancelled"], true);

    let (status, body) = app
        .post(&format!("/{}/cancel", appointment_id), &app.alice, json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = app.book(&app.bob, "10:00").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_and_list_are_scoped_to_owner() {
    let app = setup().await;

    let (_, booked) = app.book(&app.alice, "10:00").await;
    let appointment_id = booked["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/{}", appointment_id), &app.alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["id"], appointment_id);

    let (status, _) = app.get(&format!("/{}", appointment_id), &app.bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get("/", &app.bob).await;
    assert_eq!(body["appointments"], json!([]));

    let (status, _) = app.get(&format!("/{}", Uuid::new_v4()), &app.alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ledger_audit_is_admin_only() {
    let app = setup().await;
    app.book(&app.alice, "10:00").await;

    let uri = format!("/doctors/{}/ledger-audit", app.doctor_id);

    let (status, _) = app.get(&uri, &app.alice).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = TestUser::new("admin@example.com", "admin");
    let (status, body) = app.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
}
