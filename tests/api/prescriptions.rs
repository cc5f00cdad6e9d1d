use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::helpers::{TestApp, error_code};

fn prescription_body() -> Value {
    json!({
        "diagnosis": "Seasonal allergy",
        "medications": [
            { "name": "Cetirizine", "dosage": "10mg", "frequency": "once daily", "duration": "14 days", "instructions": "evening" },
            { "name": "   " }
        ],
        "notes": "review in two weeks"
    })
}

#[tokio::test]
async fn prescription_only_after_completion() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;
    let uri = format!("/api/v1/appointments/{id}/prescription");

    app.advance(&doctor, &id, &["confirmed", "in_progress"]).await;
    let (status, body) = app.post(&uri, &doctor.token, prescription_body()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "APPOINTMENT_NOT_COMPLETED");

    app.advance(&doctor, &id, &["completed"]).await;
    let (status, body) = app.post(&uri, &doctor.token, prescription_body()).await;
    assert_eq!(status, StatusCode::OK);
    let medications = body["data"]["medications"].as_array().unwrap();
    assert_eq!(medications.len(), 1);
    assert_eq!(medications[0]["name"], "Cetirizine");

    let (status, body) = app.post(&uri, &doctor.token, prescription_body()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "PRESCRIPTION_EXISTS");
}

#[tokio::test]
async fn prescription_validation() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.completed_appointment(&patient, &doctor, 1).await;
    let uri = format!("/api/v1/appointments/{id}/prescription");

    for body in [
        json!({ "diagnosis": "  ", "medications": [{ "name": "Zinc" }] }),
        json!({ "diagnosis": "Cold", "medications": [] }),
        json!({ "diagnosis": "Cold", "medications": [{ "name": "" }, { "name": " " }] }),
    ] {
        let (status, resp) = app.post(&uri, &doctor.token, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {resp}");
    }

    // patients cannot write prescriptions
    let (status, _) = app.post(&uri, &patient.token, prescription_body()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn prescription_is_private_to_its_patient_and_doctor() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let stranger = app.signup("Eve", "patient").await;
    let other_doctor = app.signup("Mallory", "doctor").await;

    let id = app.completed_appointment(&patient, &doctor, 1).await;
    let (_, body) = app
        .post(&format!("/api/v1/appointments/{id}/prescription"), &doctor.token, prescription_body())
        .await;
    let rx_uri = format!("/api/v1/prescriptions/{}", body["data"]["id"].as_str().unwrap());

    for user in [&patient, &doctor] {
        let (status, body) = app.get(&rx_uri, &user.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["diagnosis"], "Seasonal allergy");

        let (_, body) = app.get("/api/v1/prescriptions", &user.token).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    for user in [&stranger, &other_doctor] {
        let (status, _) = app.get(&rx_uri, &user.token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = app.get("/api/v1/prescriptions", &user.token).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn complete_with_prescription_is_atomic() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;
    let uri = format!("/api/v1/appointments/{id}/complete");

    // not started yet
    let (status, _) = app.post(&uri, &doctor.token, prescription_body()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.advance(&doctor, &id, &["confirmed", "in_progress"]).await;

    let (status, _) = app
        .post(&uri, &doctor.token, json!({ "diagnosis": "", "medications": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = app.get(&format!("/api/v1/appointments/{id}"), &doctor.token).await;
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, body) = app.post(&uri, &doctor.token, prescription_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["appointment"]["status"], "completed");
    assert_eq!(body["data"]["prescription"]["appointment_id"], id.as_str());

    let (_, body) = app.get(&format!("/api/v1/appointments/{id}/actions"), &patient.token).await;
    assert_eq!(body["data"]["actions"], json!(["view_prescription", "leave_feedback"]));
}
