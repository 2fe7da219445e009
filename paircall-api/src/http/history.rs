//! Session history API

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use paircall_core::models::UserId;

use super::{AppError, AppState};

/// List session history for an account, most recent first.
pub async fn list_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.history.list_for(&UserId::from(user_id)).await?;
    Ok(Json(entries))
}
