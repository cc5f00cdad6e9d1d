use axum::http::StatusCode;
use rstest::rstest;
use serde_json::json;

use crate::helpers::{TestApp, error_code};

#[rstest]
#[case(json!({ "rating": 0 }))]
#[case(json!({ "rating": 6 }))]
#[case(json!({ "comment": "no stars picked" }))]
#[tokio::test]
async fn invalid_rating_is_rejected(#[case] body: serde_json::Value) {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.completed_appointment(&patient, &doctor, 1).await;

    let (status, resp) = app
        .post(&format!("/api/v1/appointments/{id}/feedback"), &patient.token, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "INVALID_RATING");
}

#[tokio::test]
async fn feedback_once_per_appointment_and_retrievable() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.completed_appointment(&patient, &doctor, 1).await;
    let uri = format!("/api/v1/appointments/{id}/feedback");

    let (_, body) = app.get("/api/v1/feedback/pending", &patient.token).await;
    assert_eq!(body["data"][0]["id"], id.as_str());

    let (status, body) = app
        .post(&uri, &patient.token, json!({ "rating": 4, "comment": "  attentive  " }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["comment"], "attentive");

    let (status, body) = app.post(&uri, &patient.token, json!({ "rating": 5 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "FEEDBACK_EXISTS");

    let (_, body) = app.get("/api/v1/feedback", &patient.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["rating"], 4);

    let (_, body) = app.get("/api/v1/feedback", &doctor.token).await;
    assert_eq!(body["data"][0]["patient_name"], "Pat");

    let (_, body) = app.get("/api/v1/feedback/pending", &patient.token).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn feedback_needs_completed_own_appointment() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let stranger = app.signup("Eve", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.book(&patient, &doctor, 1).await;
    let uri = format!("/api/v1/appointments/{id}/feedback");

    let (status, body) = app.post(&uri, &patient.token, json!({ "rating": 5 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "APPOINTMENT_NOT_COMPLETED");

    app.advance(&doctor, &id, &["confirmed", "in_progress", "completed"]).await;

    let (status, _) = app.post(&uri, &stranger.token, json!({ "rating": 1 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(&uri, &doctor.token, json!({ "rating": 5 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_stats_aggregate_ratings() {
    let app = TestApp::spawn();
    let doctor = app.signup("Doc", "doctor").await;
    let ann = app.signup("Ann", "patient").await;
    let ben = app.signup("Ben", "patient").await;

    let reviews = [(&ann, 1, 5, "great"), (&ann, 2, 4, ""), (&ben, 1, 5, "kind"), (&ben, 2, 3, "")];
    for (patient, days, rating, comment) in reviews {
        let id = app.completed_appointment(patient, &doctor, days).await;
        let (status, body) = app
            .post(
                &format!("/api/v1/appointments/{id}/feedback"),
                &patient.token,
                json!({ "rating": rating, "comment": comment }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, body) = app.get("/api/v1/feedback/stats", &doctor.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_reviews"], 4);
    assert_eq!(body["data"]["average_rating"], 4.3);
    assert_eq!(body["data"]["with_comment"], 2);
    assert_eq!(
        body["data"]["rating_distribution"],
        json!({ "1": 0, "2": 0, "3": 1, "4": 1, "5": 2 })
    );

    // patients read the same numbers from the doctor's public stats
    let (_, public) = app
        .get(&format!("/api/v1/doctors/{}/feedback/stats", doctor.id), &ann.token)
        .await;
    assert_eq!(public["data"], body["data"]);

    // the stats endpoint is doctor-only
    let (status, _) = app.get("/api/v1/feedback/stats", &ann.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fractional_rating_gets_the_error_envelope() {
    let app = TestApp::spawn();
    let patient = app.signup("Pat", "patient").await;
    let doctor = app.signup("Doc", "doctor").await;
    let id = app.completed_appointment(&patient, &doctor, 1).await;

    let (status, body) = app
        .post(&format!("/api/v1/appointments/{id}/feedback"), &patient.token, json!({ "rating": 4.5 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, body) = app.get("/api/v1/feedback", &patient.token).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}
