//! Auth endpoints: request a code, verify it, re-issue a session.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::domains::auth::actions::{reissue_session, request_code, verify_code, VerifyOutcome};
use crate::domains::auth::{AuthError, Role};
use crate::server::app::AxumAppState;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RequestCodeBody {
    pub phone: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Serialize)]
pub struct RequestCodeResponse {
    success: bool,
    is_existing_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeBody {
    pub phone: String,
    pub code: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ReissueSessionBody {
    pub phone: String,
}

#[derive(Serialize)]
pub struct SessionPayload {
    exchange_address: String,
    exchange_token: String,
}

#[derive(Serialize)]
pub struct IdentityPayload {
    credential_id: Uuid,
    phone: String,
    role: Role,
    profile_id: Uuid,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn request_code_handler(
    Extension(state): Extension<AxumAppState>,
    Json(body): Json<RequestCodeBody>,
) -> (StatusCode, Json<RequestCodeResponse>) {
    let purpose = body.purpose.as_deref().unwrap_or("login");
    match request_code(&body.phone, purpose, &state.deps).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(RequestCodeResponse {
                success: true,
                is_existing_user: outcome.is_existing_user,
                existing_role: outcome.existing_role,
                retry_after_secs: None,
                error: None,
            }),
        ),
        Err(err) => {
            let retry_after_secs = match &err {
                AuthError::CooldownActive { retry_after_secs } => Some(*retry_after_secs),
                _ => None,
            };
            (
                error_status(&err),
                Json(RequestCodeResponse {
                    success: false,
                    is_existing_user: false,
                    existing_role: None,
                    retry_after_secs,
                    error: Some(public_message(&err)),
                }),
            )
        }
    }
}

pub async fn verify_code_handler(
    Extension(state): Extension<AxumAppState>,
    Json(body): Json<VerifyCodeBody>,
) -> (StatusCode, Json<VerifyResponse>) {
    verify_response(verify_code(&body.phone, &body.code, body.role, &state.deps).await)
}

pub async fn reissue_session_handler(
    Extension(state): Extension<AxumAppState>,
    Json(body): Json<ReissueSessionBody>,
) -> (StatusCode, Json<VerifyResponse>) {
    verify_response(reissue_session(&body.phone, &state.deps).await)
}

fn verify_response(result: Result<VerifyOutcome, AuthError>) -> (StatusCode, Json<VerifyResponse>) {
    match result {
        Ok(outcome) => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                session: Some(SessionPayload {
                    exchange_address: outcome.session.exchange_address,
                    exchange_token: outcome.session.exchange_token,
                }),
                identity: Some(IdentityPayload {
                    credential_id: outcome.identity.credential_id,
                    phone: outcome.identity.phone,
                    role: outcome.identity.role,
                    profile_id: outcome.identity.profile_id,
                }),
                error: None,
            }),
        ),
        Err(err) => (
            error_status(&err),
            Json(VerifyResponse {
                success: false,
                session: None,
                identity: None,
                error: Some(public_message(&err)),
            }),
        ),
    }
}

// =============================================================================
// Error mapping
// =============================================================================

fn error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::ChallengeNotFound
        | AuthError::ChallengeExpired
        | AuthError::ChallengeLocked
        | AuthError::CodeMismatch
        | AuthError::InvalidPhone => StatusCode::BAD_REQUEST,
        AuthError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::DataIntegrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::SessionIssuance(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Message safe to hand to the end user. Internal detail stays in the logs.
fn public_message(err: &AuthError) -> String {
    match err {
        AuthError::DataIntegrity { detail } => {
            error!(%detail, "identity records need operator reconciliation");
            "internal error".to_string()
        }
        AuthError::Storage(source) => {
            warn!(%source, "storage unavailable while handling auth request");
            "temporarily unavailable, retry shortly".to_string()
        }
        AuthError::SessionIssuance(source) => {
            error!(%source, "session issuance failed after successful verification");
            "session issuance failed; retry without requesting a new code".to_string()
        }
        other => other.to_string(),
    }
}
