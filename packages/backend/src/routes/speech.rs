use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use pulpit_algo::sanitize::ascii_slug;

use crate::response::AppError;
use crate::services::speech::Voice;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SpeechRequest {
    text: String,
    voice: Voice,
    /// Verse reference, used for the download file name
    reference: Option<String>,
}

pub(super) async fn synthesize(
    State(state): State<AppState>,
    Json(payload): Json<SpeechRequest>,
) -> Result<impl IntoResponse, AppError> {
    let speech = state
        .speech()
        .ok_or_else(|| AppError::not_configured("speech is not configured"))?;

    let audio = speech.synthesize(&payload.text, payload.voice.profile()).await?;

    let prefix = match payload.voice {
        Voice::English => "esv",
        Voice::Chinese => "chinese",
    };
    let reference = payload.reference.as_deref().unwrap_or("demo");
    let file_name = format!("{prefix}_{}.mp3", ascii_slug(reference).replace('"', "_"));

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_DISPOSITION, format!("inline; filename=\"{file_name}\"")),
        ],
        audio,
    ))
}
