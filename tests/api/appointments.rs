use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::{TestApp, day_from_today, error_code};

#[tokio::test]
async fn booking_creates_pending_appointment() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;

    let (status, body) = app
        .post(
            "/api/v1/appointments",
            &patient.token,
            json!({ "doctor_id": doctor.id, "date": day_from_today(1), "time": "10:15", "note": " cough " }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["doctor_name"], "Doc");
    assert_eq!(body["data"]["patient_name"], "Pat");
    assert_eq!(body["data"]["note"], "cough");

    let (_, body) = app.get("/api/v1/appointments", &doctor.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn booking_yesterday_is_rejected() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;

    let (status, body) = app
        .post(
            "/api/v1/appointments",
            &patient.token,
            json!({ "doctor_id": doctor.id, "date": day_from_today(-1), "time": "10:15" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "DATE_IN_PAST");
}

#[tokio::test]
async fn at_most_two_bookings_per_day() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;

    app.book(&patient, &doctor, 2).await;
    app.book(&patient, &doctor, 2).await;

    let (status, body) = app
        .post(
            "/api/v1/appointments",
            &patient.token,
            json!({ "doctor_id": doctor.id, "date": day_from_today(2), "time": "16:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "DAILY_LIMIT_REACHED");

    let (_, body) = app
        .get(&format!("/api/v1/appointments?date={}", day_from_today(2)), &patient.token)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn doctors_cannot_book() {
    let app = TestApp::spawn();
    let doctor = app.signup("Doc", "doctor").await;

    let (status, _) = app
        .post(
            "/api/v1/appointments",
            &doctor.token,
            json!({ "doctor_id": doctor.id, "date": day_from_today(1), "time": "10:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lifecycle_moves_forward_only() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;
    let status_uri = format!("/api/v1/appointments/{id}/status");

    // skipping a state
    let (status, body) = app.post(&status_uri, &doctor.token, json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_TRANSITION");

    let (_, body) = app.get(&format!("/api/v1/appointments/{id}/actions"), &doctor.token).await;
    assert_eq!(body["data"]["actions"], json!(["confirm", "cancel"]));

    app.advance(&doctor, &id, &["confirmed", "in_progress"]).await;

    // in_progress cannot be cancelled
    let (status, _) = app.post(&status_uri, &doctor.token, json!({ "status": "cancelled" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.advance(&doctor, &id, &["completed"]).await;
    let (_, body) = app.get(&format!("/api/v1/appointments/{id}"), &patient.token).await;
    assert_eq!(body["data"]["status"], "completed");

    let (status, _) = app.post(&status_uri, &doctor.token, json!({ "status": "pending" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_is_terminal() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;

    app.advance(&doctor, &id, &["confirmed", "cancelled"]).await;

    let (status, _) = app
        .post(&format!("/api/v1/appointments/{id}/status"), &doctor.token, json!({ "status": "confirmed" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .get("/api/v1/appointments?status=cancelled", &patient.token)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_the_assigned_doctor_changes_status() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let other = app.signup("Other", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;
    let status_uri = format!("/api/v1/appointments/{id}/status");

    for token in [&patient.token, &other.token] {
        let (status, body) = app.post(&status_uri, token, json!({ "status": "confirmed" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_code(&body), "FORBIDDEN");
    }

    let (status, _) = app.get(&format!("/api/v1/appointments/{id}"), &other.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get("/api/v1/appointments/00000000-0000-0000-0000-000000000000", &doctor.token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_gets_the_error_envelope() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;

    let (status, body) = app
        .post(&format!("/api/v1/appointments/{id}/status"), &doctor.token, json!({ "status": "bogus" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app
        .post(
            "/api/v1/appointments",
            &patient.token,
            json!({ "doctor_id": "not-a-uuid", "date": day_from_today(1), "time": "10:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app.get("/api/v1/appointments?status=nope", &patient.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app.get("/api/v1/appointments/not-a-uuid", &patient.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = app
        .request(
            axum::http::Method::POST,
            "/api/v1/appointments",
            Some(&patient.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}
