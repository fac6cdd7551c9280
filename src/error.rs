//! Error taxonomy for quiz and attempt operations, and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Errors surfaced by the catalog, the attempt store and the session state machine.
///
/// Everything except `Storage` is recoverable at the client boundary.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("Quiz not found")]
    QuizNotFound,

    #[error("Quiz opens at {opens_at}")]
    QuizNotOpen { opens_at: DateTime<Utc> },

    #[error("Quiz has ended")]
    QuizClosed,

    #[error("Question {0} is not part of this quiz")]
    UnknownQuestion(String),

    #[error("Option {option} is not a valid choice for question {question_id}")]
    InvalidOption { question_id: String, option: u8 },

    #[error("No attempt found for this quiz")]
    AttemptNotFound,

    #[error("Attempt has not been submitted yet")]
    NotSubmitted,

    #[error("Deadline passed at {deadline}")]
    DeadlinePassed { deadline: DateTime<Utc> },

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("Quiz already has attempts")]
    QuizHasAttempts,

    #[error("Only the quiz creator can do this")]
    Forbidden,

    #[error("Missing participant identity")]
    Unauthenticated,

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl AttemptError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AttemptError::QuizNotFound => "QUIZ_NOT_FOUND",
            AttemptError::QuizNotOpen { .. } => "QUIZ_NOT_OPEN",
            AttemptError::QuizClosed => "QUIZ_CLOSED",
            AttemptError::UnknownQuestion(_) => "UNKNOWN_QUESTION",
            AttemptError::InvalidOption { .. } => "INVALID_OPTION",
            AttemptError::AttemptNotFound => "ATTEMPT_NOT_FOUND",
            AttemptError::NotSubmitted => "NOT_SUBMITTED",
            AttemptError::DeadlinePassed { .. } => "DEADLINE_PASSED",
            AttemptError::InvalidQuiz(_) => "INVALID_QUIZ",
            AttemptError::QuizHasAttempts => "QUIZ_HAS_ATTEMPTS",
            AttemptError::Forbidden => "FORBIDDEN",
            AttemptError::Unauthenticated => "UNAUTHENTICATED",
            AttemptError::Storage(_) => "STORAGE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AttemptError::QuizNotFound | AttemptError::AttemptNotFound => StatusCode::NOT_FOUND,
            AttemptError::QuizNotOpen { .. }
            | AttemptError::QuizClosed
            | AttemptError::NotSubmitted
            | AttemptError::DeadlinePassed { .. }
            | AttemptError::QuizHasAttempts => StatusCode::CONFLICT,
            AttemptError::UnknownQuestion(_)
            | AttemptError::InvalidOption { .. }
            | AttemptError::InvalidQuiz(_) => StatusCode::BAD_REQUEST,
            AttemptError::Forbidden => StatusCode::FORBIDDEN,
            AttemptError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AttemptError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AttemptError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AttemptError::Storage(msg) => {
                tracing::error!("Storage failure: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
