use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use clinic_care::config::Config;
use clinic_care::models::AppState;
use clinic_care::store::MemoryStore;

pub struct TestApp {
    router: Router,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

pub fn day_from_today(offset: i64) -> String {
    (Utc::now().date_naive() + Duration::days(offset))
        .format("%Y-%m-%d")
        .to_string()
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

impl TestApp {
    pub fn spawn() -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()), &Config::default());
        Self {
            router: clinic_care::app(state),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request.");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request.");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body.")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers and logs in; email is derived from the name.
    pub async fn signup(&self, name: &str, role: &str) -> TestUser {
        let email = format!("{}@clinic.example", name.to_lowercase());
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": email, "password": "password1", "name": name, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");

        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        TestUser {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            token: body["data"]["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// Books an appointment `days` from today and returns its id.
    pub async fn book(&self, patient: &TestUser, doctor: &TestUser, days: i64) -> String {
        let (status, body) = self
            .post(
                "/api/v1/appointments",
                &patient.token,
                json!({ "doctor_id": doctor.id, "date": day_from_today(days), "time": "09:30" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "booking failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Drives the appointment through the given statuses as its doctor.
    pub async fn advance(&self, doctor: &TestUser, appointment_id: &str, statuses: &[&str]) {
        for status in statuses {
            let (code, body) = self
                .post(
                    &format!("/api/v1/appointments/{appointment_id}/status"),
                    &doctor.token,
                    json!({ "status": status }),
                )
                .await;
            assert_eq!(code, StatusCode::OK, "transition to {status} failed: {body}");
        }
    }

    pub async fn completed_appointment(&self, patient: &TestUser, doctor: &TestUser, days: i64) -> String {
        let id = self.book(patient, doctor, days).await;
        self.advance(doctor, &id, &["confirmed", "in_progress", "completed"])
            .await;
        id
    }
}
