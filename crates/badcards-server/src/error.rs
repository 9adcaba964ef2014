use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use badcards_core::session::SessionError;

#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    BadRequest(String),
    #[allow(dead_code)]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(e) => write!(f, "{e}"),
            Self::BadRequest(m) | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            Self::Session(e) => {
                let status = match e {
                    SessionError::NotFound(_) => StatusCode::NOT_FOUND,
                    SessionError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    SessionError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                    SessionError::AlreadyMember
                    | SessionError::NotPending
                    | SessionError::CommandRejected(_)
                    | SessionError::AlreadyRestarting => StatusCode::CONFLICT,
                };
                (status, e.kind(), e.to_string())
            },
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m.clone()),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m.clone()),
        };
        (
            status,
            Json(serde_json::json!({ "error": message, "kind": kind })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_expected_statuses() {
        let cases = [
            (
                SessionError::NotFound("x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                SessionError::Unauthorized("x".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (SessionError::AlreadyMember, StatusCode::CONFLICT),
            (SessionError::NotPending, StatusCode::CONFLICT),
            (
                SessionError::CommandRejected("x".to_string()),
                StatusCode::CONFLICT,
            ),
            (SessionError::AlreadyRestarting, StatusCode::CONFLICT),
            (
                SessionError::InvalidConfig("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            let resp = AppError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }
}
