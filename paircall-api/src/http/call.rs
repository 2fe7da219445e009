//! Call lifecycle API
//!
//! Thin wrappers over the signaling service's transition operations.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use paircall_core::models::{CallId, CallStatus, UserId};

use super::{AppError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub caller_id: String,
    pub caller_name: String,
    pub callee_id: String,
    pub callee_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallResponse {
    pub call_id: String,
    pub room_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusResponse {
    pub call_id: String,
    pub status: CallStatus,
}

/// Create a ringing invite from caller to callee.
pub async fn create_call(
    State(state): State<AppState>,
    Json(req): Json<CreateCallRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (call_id, room_id) = state
        .signaling
        .create_call(
            &UserId::from(req.caller_id),
            &req.caller_name,
            &UserId::from(req.callee_id),
            &req.callee_name,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCallResponse {
            call_id: call_id.to_string(),
            room_id,
        }),
    ))
}

/// Accept a ringing call.
pub async fn accept_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invite = state
        .signaling
        .accept_call(&CallId::from_string(call_id))
        .await?;

    Ok(Json(CallStatusResponse {
        call_id: invite.id.to_string(),
        status: invite.status,
    }))
}

/// End a call. Idempotent.
pub async fn end_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invite = state
        .signaling
        .end_call(&CallId::from_string(call_id))
        .await?;

    Ok(Json(CallStatusResponse {
        call_id: invite.id.to_string(),
        status: invite.status,
    }))
}

/// Fetch a call invite.
pub async fn get_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invite = state
        .signaling
        .get_call(&CallId::from_string(call_id))
        .await?;
    Ok(Json(invite))
}
