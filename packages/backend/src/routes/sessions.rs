use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use pulpit_algo::{ApplySummary, GradeResult, NextBatch, PracticeItem, Progress};

use super::parse_session_id;
use crate::response::{json_error, ok, AppError};
use crate::services::audio::{resolve_mime, AudioClip};
use crate::services::coach::{CoachMode, UnknownMode};
use crate::services::evaluator::BatchSubmission;
use crate::session::{try_lock, PracticeSession};
use crate::state::AppState;

/// Optional client-side file name of an uploaded recording
const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateSessionRequest {
    book: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SelectBookRequest {
    book: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SelectModeRequest {
    mode: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NextBatchRequest {
    size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApplyResultsRequest {
    results: Vec<GradeResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    items: Vec<PracticeItem>,
    recycled: bool,
    mastered: bool,
    progress: Progress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GradedResponse {
    summary: ApplySummary,
    results: Vec<GradeResult>,
    mastered: bool,
    progress: Progress,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

fn parse_mode(raw: Option<&str>) -> Result<CoachMode, AppError> {
    match raw {
        None => Ok(CoachMode::default()),
        Some(raw) => raw
            .parse()
            .map_err(|e: UnknownMode| AppError::validation(e.to_string())),
    }
}

fn require_book(session: &PracticeSession) -> Result<(), AppError> {
    if session.book().is_none() {
        return Err(json_error(
            StatusCode::CONFLICT,
            "NO_BOOK_LOADED",
            "select a book first",
        ));
    }
    Ok(())
}

fn graded(session: &PracticeSession, summary: ApplySummary) -> GradedResponse {
    GradedResponse {
        summary,
        results: session.queue().last_results().to_vec(),
        mastered: session.queue().is_mastered(),
        progress: session.queue().progress(),
    }
}

pub(super) async fn create_session(
    State(state): State<AppState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let mode = parse_mode(payload.mode.as_deref())?;

    let mut session = PracticeSession::new(mode);
    if let Some(name) = payload.book.as_deref() {
        let library = state.library();
        let book = library
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("book '{name}' not found")))?;
        session.load_book(name, book);
    }

    let snapshot = session.snapshot();
    state.sessions().insert(session);
    Ok((StatusCode::CREATED, ok(snapshot)))
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let handle = state.sessions().get(id)?;
    let session = try_lock(id, &handle)?;
    Ok(ok(session.snapshot()))
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let sessions = state.sessions();
    let handle = sessions.get(id)?;
    // Refuse while a submission holds the session
    drop(try_lock(id, &handle)?);
    sessions.remove(id);
    Ok(ok(DeletedResponse { deleted: true }))
}

pub(super) async fn select_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SelectBookRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let library = state.library();
    let name = payload.book.trim();
    let book = library
        .get(name)
        .ok_or_else(|| AppError::not_found(format!("book '{name}' not found")))?;

    let handle = state.sessions().get(id)?;
    let mut session = try_lock(id, &handle)?;
    session.load_book(name, book);
    Ok(ok(session.snapshot()))
}

pub(super) async fn select_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SelectModeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let mode = parse_mode(Some(&payload.mode))?;

    let handle = state.sessions().get(id)?;
    let mut session = try_lock(id, &handle)?;
    session.set_mode(mode);
    Ok(ok(session.snapshot()))
}

pub(super) async fn next_batch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<NextBatchRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let size = payload.size.unwrap_or(state.config().batch_size);

    let handle = state.sessions().get(id)?;
    let mut session = try_lock(id, &handle)?;
    require_book(&session)?;

    let response = match session.next_batch(size)? {
        NextBatch::Ready { items, recycled } => BatchResponse {
            items: items.iter().map(|item| PracticeItem::clone(item)).collect(),
            recycled,
            mastered: false,
            progress: session.queue().progress(),
        },
        NextBatch::Mastered => BatchResponse {
            items: Vec::new(),
            recycled: false,
            mastered: true,
            progress: session.queue().progress(),
        },
    };
    Ok(ok(response))
}

/// Grades one recording of the outstanding batch. The session stays locked
/// for the whole evaluator round trip; on failure the batch is untouched.
pub(super) async fn submit_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let handle = state.sessions().get(id)?;
    let mut session = try_lock(id, &handle)?;

    let items = session.queue().current_batch().to_vec();
    if items.is_empty() {
        return Err(AppError::from(pulpit_algo::QueueError::NoOutstandingBatch));
    }

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let file_name = headers.get(FILE_NAME_HEADER).and_then(|v| v.to_str().ok());
    let audio = AudioClip::new(body, resolve_mime(content_type, file_name));

    let submission = BatchSubmission {
        items,
        audio,
        mode: session.mode(),
    };
    let results = state.evaluator().grade_batch(submission).await.map_err(|err| {
        warn!(session = %id, error = %err, "evaluation failed; batch kept");
        AppError::from(err)
    })?;

    let summary = session.apply_results(results)?;
    Ok(ok(graded(&session, summary)))
}

pub(super) async fn apply_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ApplyResultsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_session_id(&id)?;
    let handle = state.sessions().get(id)?;
    let mut session = try_lock(id, &handle)?;

    let summary = session.apply_results(payload.results)?;
    Ok(ok(graded(&session, summary)))
}
