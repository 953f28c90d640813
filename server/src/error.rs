//! HTTP-facing error type. Internal causes are logged verbatim; the client
//! sees only the short user-friendly messages below.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("error fetching {user} games")]
    FetchGames { user: String },
    #[error("user {user} doesn't exist")]
    UserNotFound { user: String },
    #[error("error generating puzzles")]
    PuzzleGeneration,
    #[error("error saving tasks to db")]
    Persistence,
    #[error("no such job")]
    JobNotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UserNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::JobNotFound => StatusCode::NOT_FOUND,
            AppError::FetchGames { .. } | AppError::PuzzleGeneration | AppError::Persistence => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
