use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;

use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState};
use crate::services::dashboard::{self, Dashboard};

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

/// Role-based landing view. Clients redirect here after login or when a view
/// is not open to the caller's role.
pub async fn home(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Dashboard>>, ApiError> {
    let today = Utc::now().date_naive();
    let data = dashboard::dashboard(state.store.as_ref(), &auth, today).await?;
    Ok(Json(ApiOk { data }))
}
