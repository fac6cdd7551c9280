//! HTTP API endpoints.
//!
//! Participant and creator routes identify the caller through the
//! `X-Participant-Id` header. Snapshot routes sit behind admin Basic auth.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, AuthConfig, Caller};
use crate::error::AttemptError;
use crate::state::export::StateSnapshot;
use crate::state::AppState;
use crate::types::*;

type ApiResult<T> = Result<Json<T>, AttemptError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub option: OptionNumber,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub reason: Option<FinalizeReason>,
}

/// Build the application router
pub fn router(state: Arc<AppState>, auth_config: Arc<AuthConfig>) -> Router {
    let admin_routes = Router::new()
        .route("/api/admin/state/export", get(export_state))
        .route("/api/admin/state/import", post(import_state))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/quizzes", post(create_quiz))
        .route("/api/quizzes/mine", get(my_quizzes))
        .route("/api/quizzes/{quiz_id}", delete(delete_quiz))
        .route("/api/quizzes/{quiz_id}/info", get(quiz_info))
        .route("/api/quizzes/{quiz_id}/schedule", patch(reschedule))
        .route("/api/quizzes/{quiz_id}/stop", post(stop_quiz))
        .route("/api/quizzes/{quiz_id}/attempt", post(begin_attempt))
        .route("/api/quizzes/{quiz_id}/attempt/status", get(attempt_status))
        .route("/api/quizzes/{quiz_id}/attempt/answers", patch(record_answer))
        .route("/api/quizzes/{quiz_id}/attempt/submit", post(submit_attempt))
        .route("/api/quizzes/{quiz_id}/responses", get(responses))
        .route("/api/attempts", get(my_attempts))
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// POST /api/quizzes
async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(input): Json<NewQuiz>,
) -> Result<(StatusCode, Json<QuizDefinition>), AttemptError> {
    let quiz = state.create_quiz(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// GET /api/quizzes/mine
async fn my_quizzes(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Json<Vec<QuizDefinition>> {
    Json(state.quizzes_by_creator(&caller).await)
}

/// DELETE /api/quizzes/{quiz_id}
async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> Result<StatusCode, AttemptError> {
    state.delete_quiz(&caller, &quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/quizzes/{quiz_id}/info
async fn quiz_info(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<QuizInfo> {
    Ok(Json(state.quiz_info(&quiz_id, &caller).await?))
}

/// PATCH /api/quizzes/{quiz_id}/schedule
async fn reschedule(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
    Json(change): Json<ScheduleChange>,
) -> ApiResult<QuizDefinition> {
    Ok(Json(state.reschedule(&caller, &quiz_id, change).await?))
}

/// POST /api/quizzes/{quiz_id}/stop
async fn stop_quiz(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<QuizDefinition> {
    Ok(Json(state.force_stop(&caller, &quiz_id).await?))
}

/// POST /api/quizzes/{quiz_id}/attempt
///
/// Starts the attempt or resumes it. Safe to call again after a page reload.
async fn begin_attempt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<AttemptSheet> {
    Ok(Json(state.begin_sheet(&quiz_id, &caller).await?))
}

/// GET /api/quizzes/{quiz_id}/attempt/status
async fn attempt_status(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<SessionView> {
    Ok(Json(state.poll(&quiz_id, &caller).await?))
}

/// PATCH /api/quizzes/{quiz_id}/attempt/answers
async fn record_answer(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<SessionView> {
    let view = state
        .record_answer(&quiz_id, &caller, &req.question_id, req.option)
        .await?;
    Ok(Json(view))
}

/// POST /api/quizzes/{quiz_id}/attempt/submit
///
/// The body is optional; without one the submission counts as manual.
async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
    body: Option<Json<FinalizeRequest>>,
) -> ApiResult<SessionView> {
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or(FinalizeReason::Manual);
    Ok(Json(state.finalize(&quiz_id, &caller, reason).await?))
}

/// GET /api/quizzes/{quiz_id}/responses
async fn responses(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(quiz_id): Path<QuizId>,
) -> ApiResult<AttemptResult> {
    Ok(Json(state.attempt_result(&quiz_id, &caller).await?))
}

/// GET /api/attempts
async fn my_attempts(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<AttemptSummary>> {
    Ok(Json(state.attempted_quizzes(&caller).await?))
}

/// Export the entire state as JSON.
///
/// GET /api/admin/state/export
async fn export_state(State(state): State<Arc<AppState>>) -> ApiResult<StateSnapshot> {
    Ok(Json(state.export_state().await?))
}

/// Import a state snapshot, replacing all current quizzes and attempts.
///
/// POST /api/admin/state/import
async fn import_state(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<StateSnapshot>,
) -> Response {
    match state.import_state(snapshot).await {
        Ok(()) => (StatusCode::OK, "State imported successfully").into_response(),
        Err(e) => {
            tracing::error!("State import failed: {}", e);
            (StatusCode::BAD_REQUEST, format!("Import failed: {}", e)).into_response()
        }
    }
}
