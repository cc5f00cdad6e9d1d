use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod feedback_routes;
pub mod home_routes;
pub mod prescription_routes;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes::router())
        .merge(home_routes::router())
        .merge(doctor_routes::router())
        .merge(appointment_routes::router())
        .merge(prescription_routes::router())
        .merge(feedback_routes::router());

    Router::new().nest("/api/v1", api).with_state(state)
}
