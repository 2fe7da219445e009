//! Join token API
//!
//! Issues short-lived room join tokens for the media transport. The
//! fields mirror what the web client sends when it is about to enter a
//! call room.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::{AppError, AppState};

/// Request to mint a join token.
///
/// All three fields are required; they are optional here so their absence
/// maps to a 400 instead of a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub participant_identity: Option<String>,
    #[serde(default)]
    pub participant_name: Option<String>,
}

/// Response containing the join token
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

/// Mint a join token for (room, identity, name).
///
/// Missing request fields produce a 400; a server without transport API
/// credentials produces a 500.
pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let room_name = required(&req.room_name, "roomName")?;
    let identity = required(&req.participant_identity, "participantIdentity")?;
    let name = required(&req.participant_name, "participantName")?;

    let credentials = state.credential_service.as_ref().ok_or_else(|| {
        AppError::internal_server_error("transport API credentials not configured")
    })?;

    let token = credentials.mint(room_name, identity, name)?;

    Ok((StatusCode::OK, Json(TokenResponse { token })))
}
