//! Central error type + axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("User already exists")]
    DuplicateUser,

    #[error("Already in use")]
    Conflict,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Error sending email")]
    Mail(#[from] MailError),

    #[error("Database error")]
    Store(#[source] sqlx::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // The store is the source of truth for uniqueness; a racing
            // writer losing to a unique constraint is a 400, not a 500.
            sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict,
            _ => ApiError::Store(err),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateUser
            | ApiError::Conflict
            | ApiError::InvalidCredentials
            | ApiError::InvalidToken => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Mail(_) | ApiError::Store(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
