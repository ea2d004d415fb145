mod books;
mod coach;
mod health;
mod sessions;
mod speech;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

use pulpit_algo::QueueError;

use crate::response::{json_error, AppError};
use crate::services::evaluator::EvaluatorError;
use crate::services::speech::SpeechError;
use crate::session::SessionError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let audio_limit = DefaultBodyLimit::max(state.config().max_audio_bytes);
    let audio_json_limit = DefaultBodyLimit::max(state.config().max_audio_json_bytes());

    Router::new()
        .route("/api/books", get(books::list_books).fallback(fallback_handler))
        .route("/api/books/:book", get(books::get_book).fallback(fallback_handler))
        .route(
            "/api/sessions",
            post(sessions::create_session).fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id",
            get(sessions::get_session)
                .delete(sessions::delete_session)
                .fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id/book",
            put(sessions::select_book).fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id/mode",
            put(sessions::select_mode).fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id/batch",
            post(sessions::next_batch).fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id/submission",
            post(sessions::submit_recording)
                .layer(audio_limit)
                .fallback(fallback_handler),
        )
        .route(
            "/api/sessions/:id/results",
            post(sessions::apply_results).fallback(fallback_handler),
        )
        .route(
            "/api/coach/evaluate",
            post(coach::evaluate_card)
                .layer(audio_json_limit)
                .fallback(fallback_handler),
        )
        .route("/api/speech", post(speech::synthesize).fallback(fallback_handler))
        .nest("/health", health::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "接口不存在").into_response()
}

pub(crate) fn parse_session_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::validation(format!("invalid session id '{raw}'")))
}

// ============================================================================
// Error mapping
// ============================================================================

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::ZeroBatchSize => AppError::validation(err.to_string()),
            QueueError::BatchOutstanding(_) => {
                json_error(StatusCode::CONFLICT, "BATCH_OUTSTANDING", err.to_string())
            }
            QueueError::NoOutstandingBatch => {
                json_error(StatusCode::CONFLICT, "NO_OUTSTANDING_BATCH", err.to_string())
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => {
                json_error(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", err.to_string())
            }
            SessionError::Busy(_) => {
                json_error(StatusCode::CONFLICT, "SUBMISSION_IN_FLIGHT", err.to_string())
            }
        }
    }
}

impl From<EvaluatorError> for AppError {
    fn from(err: EvaluatorError) -> Self {
        match err {
            EvaluatorError::NotConfigured(_) => AppError::not_configured(err.to_string()),
            EvaluatorError::Llm(_) | EvaluatorError::Malformed(_) => {
                AppError::upstream("EVALUATOR_ERROR", err.to_string())
            }
        }
    }
}

impl From<SpeechError> for AppError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NotConfigured(_) => AppError::not_configured(err.to_string()),
            SpeechError::EmptyText => AppError::validation(err.to_string()),
            SpeechError::Request(_) | SpeechError::HttpStatus { .. } => {
                AppError::upstream("SPEECH_ERROR", err.to_string())
            }
            SpeechError::Io(_) => AppError::internal(err.to_string()),
        }
    }
}
