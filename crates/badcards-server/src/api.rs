use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use badcards_core::net::messages::SessionSnapshot;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub owner_guid: Uuid,
    pub nickname: String,
    /// Optional fixed rounds-to-win; when absent the configured curve
    /// derives it from the player count.
    pub rounds_to_win: Option<u32>,
}

#[derive(Deserialize)]
pub struct JoinBody {
    pub guid: Uuid,
    pub nickname: String,
}

/// `guid` is the acting user (the approver); `target` the pending entrant.
#[derive(Deserialize)]
pub struct ApprovalBody {
    pub guid: Uuid,
    pub target: Uuid,
}

#[derive(Deserialize)]
pub struct GuidBody {
    pub guid: Uuid,
}

/// `guid` is the acting player scoring the round; `target` the round winner.
#[derive(Deserialize)]
pub struct RoundWinBody {
    pub guid: Uuid,
    pub target: Uuid,
}

#[derive(Deserialize)]
pub struct ViewerQuery {
    pub guid: Uuid,
}

#[derive(Serialize)]
pub struct ChatEligibleResponse {
    pub eligible: bool,
}

fn validate_nickname(nickname: &str) -> Result<String, AppError> {
    let name = nickname.trim().to_string();
    if name.is_empty() || name.len() > 64 || name.chars().any(|c| c.is_control()) {
        return Err(AppError::BadRequest("invalid nickname".to_string()));
    }
    Ok(name)
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let nickname = validate_nickname(&body.nickname)?;
    let mut store = state.store.write().await;
    let snapshot = store.create(body.owner_guid, nickname, body.rounds_to_win)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let store = state.store.read().await;
    Ok(Json(store.snapshot(&id)?))
}

/// POST /api/v1/sessions/{id}/join
pub async fn request_join(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<JoinBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let nickname = validate_nickname(&body.nickname)?;
    let mut store = state.store.write().await;
    Ok(Json(store.request_join(&id, body.guid, nickname)?))
}

/// POST /api/v1/sessions/{id}/approve
pub async fn approve_join(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApprovalBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut store = state.store.write().await;
    Ok(Json(store.approve_join(&id, body.guid, body.target)?))
}

/// POST /api/v1/sessions/{id}/deny
pub async fn deny_join(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApprovalBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut store = state.store.write().await;
    Ok(Json(store.deny_join(&id, body.guid, body.target)?))
}

/// POST /api/v1/sessions/{id}/spectate
pub async fn spectate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GuidBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut store = state.store.write().await;
    Ok(Json(store.spectate(&id, body.guid)?))
}

/// POST /api/v1/sessions/{id}/leave
///
/// An owner leaving closes the session; 204 distinguishes that from the
/// ordinary snapshot response.
pub async fn leave(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GuidBody>,
) -> Result<axum::response::Response, AppError> {
    use axum::response::IntoResponse;

    let mut store = state.store.write().await;
    match store.leave(&id, body.guid)? {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /api/v1/sessions/{id}/round-win
pub async fn record_round_win(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RoundWinBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let mut store = state.store.write().await;
    Ok(Json(store.record_round_win(&id, body.guid, body.target)?))
}

/// POST /api/v1/sessions/{id}/restart
///
/// Two-phase: the in-flight marker is taken under one store lock, the
/// reset committed under a second. A duplicate request that lands between
/// the two observes the marker and is rejected with `already_restarting`
/// instead of resetting twice.
pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<GuidBody>,
) -> Result<Json<SessionSnapshot>, AppError> {
    {
        let mut store = state.store.write().await;
        store.begin_restart(&id, body.guid)?;
    }

    let mut store = state.store.write().await;
    match store.commit_restart(&id) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            store.abort_restart(&id);
            Err(e.into())
        },
    }
}

/// GET /api/v1/sessions/{id}/chat-eligible?guid=...
pub async fn chat_eligible(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<ChatEligibleResponse>, AppError> {
    let store = state.store.read().await;
    let eligible = store.chat_eligible(&id, query.guid)?;
    Ok(Json(ChatEligibleResponse { eligible }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_validation() {
        assert_eq!(validate_nickname("  Alice  ").unwrap(), "Alice");
        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname("bad\u{0007}name").is_err());
        assert!(validate_nickname(&"x".repeat(65)).is_err());
    }
}
