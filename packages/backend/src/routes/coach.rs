use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use pulpit_algo::{GradeResult, PracticeItem};

use crate::response::{ok, AppError};
use crate::services::audio::AudioClip;
use crate::services::coach::CoachMode;
use crate::services::evaluator::CardSubmission;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EvaluateCardRequest {
    book: String,
    item_id: u32,
    mode: Option<String>,
    /// base64, optionally as a `data:` URL
    audio: String,
    mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateCardResponse {
    item: PracticeItem,
    mode: CoachMode,
    result: GradeResult,
}

/// Single-card coaching, independent of any session queue
pub(super) async fn evaluate_card(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mode = match payload.mode.as_deref() {
        Some(raw) => raw
            .parse::<CoachMode>()
            .map_err(|e| AppError::validation(e.to_string()))?,
        None => CoachMode::default(),
    };

    let library = state.library();
    let book = library
        .get(&payload.book)
        .ok_or_else(|| AppError::not_found(format!("book '{}' not found", payload.book)))?;
    let item: Arc<PracticeItem> = book
        .get(payload.item_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("item {} not found in {}", payload.item_id, payload.book)))?;

    let audio = AudioClip::from_base64(&payload.audio, payload.mime_type.as_deref())
        .map_err(|e| AppError::validation(format!("audio is not valid base64: {e}")))?;

    let result = state
        .evaluator()
        .grade_card(CardSubmission {
            item: Arc::clone(&item),
            audio,
            mode,
        })
        .await?
        .sanitized();

    Ok(ok(EvaluateCardResponse {
        item: PracticeItem::clone(&item),
        mode,
        result,
    }))
}
