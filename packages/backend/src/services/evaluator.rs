//! Speech evaluation
//!
//! An [`Evaluator`] turns one learner recording into grades. The batch flow
//! grades a recording that covers several items spoken in order; the card
//! flow coaches a single item in depth.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use pulpit_algo::sanitize::extract_json_payload;
use pulpit_algo::{GradeResult, GradeStatus, PracticeItem};

use crate::services::audio::AudioClip;
use crate::services::coach::{self, CoachMode};
use crate::services::llm_provider::{ChatMessage, LLMError, LLMProvider};

const EMPTY_AUDIO_FEEDBACK: &str = "音频文件为空";

#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("evaluator not configured: {0}")]
    NotConfigured(String),
    #[error("evaluator request failed: {0}")]
    Llm(#[from] LLMError),
    #[error("evaluator returned malformed output: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub items: Vec<Arc<PracticeItem>>,
    pub audio: AudioClip,
    pub mode: CoachMode,
}

#[derive(Debug, Clone)]
pub struct CardSubmission {
    pub item: Arc<PracticeItem>,
    pub audio: AudioClip,
    pub mode: CoachMode,
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Grades every item of the batch. Items missing from the output are
    /// left to the caller (they count as failures).
    async fn grade_batch(&self, submission: BatchSubmission) -> Result<Vec<GradeResult>, EvaluatorError>;

    async fn grade_card(&self, submission: CardSubmission) -> Result<GradeResult, EvaluatorError>;
}

/// Evaluator backed by an OpenAI-compatible multimodal chat model
#[derive(Clone)]
pub struct LlmEvaluator {
    provider: LLMProvider,
}

impl LlmEvaluator {
    pub fn new(provider: LLMProvider) -> Self {
        Self { provider }
    }

    pub fn from_env() -> Self {
        Self::new(LLMProvider::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    fn ensure_available(&self) -> Result<(), EvaluatorError> {
        if self.provider.is_available() {
            Ok(())
        } else {
            Err(EvaluatorError::NotConfigured(
                "set LLM_API_KEY or GEMINI_API_KEY".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn grade_batch(&self, submission: BatchSubmission) -> Result<Vec<GradeResult>, EvaluatorError> {
        if submission.audio.is_empty() {
            debug!(items = submission.items.len(), "empty recording, failing batch locally");
            return Ok(silent_results(&submission.items));
        }
        self.ensure_available()?;

        let items: Vec<&PracticeItem> = submission.items.iter().map(Arc::as_ref).collect();
        let messages = [
            ChatMessage::system(submission.mode.system_prompt()),
            ChatMessage::user_with_audio(coach::batch_prompt(&items), &submission.audio),
        ];

        let reply = self.provider.complete(&messages, None).await?;
        let results = parse_batch_response(&reply)?;
        info!(
            items = items.len(),
            graded = results.len(),
            mode = %submission.mode,
            "batch evaluated"
        );
        Ok(results)
    }

    async fn grade_card(&self, submission: CardSubmission) -> Result<GradeResult, EvaluatorError> {
        let id = submission.item.id;
        if submission.audio.is_empty() {
            return Ok(GradeResult::silent(id, EMPTY_AUDIO_FEEDBACK));
        }
        self.ensure_available()?;

        let messages = [
            ChatMessage::system(submission.mode.system_prompt()),
            ChatMessage::user_with_audio(
                coach::card_prompt(&submission.item, submission.mode),
                &submission.audio,
            ),
        ];

        let reply = self.provider.complete(&messages, None).await?;
        let result = parse_card_response(&reply, id)?;
        info!(id, status = %result.status, mode = %submission.mode, "card evaluated");
        Ok(result)
    }
}

/// Local `fail` for every item, used when the recording is empty
pub fn silent_results(items: &[Arc<PracticeItem>]) -> Vec<GradeResult> {
    items
        .iter()
        .map(|item| GradeResult::silent(item.id, EMPTY_AUDIO_FEEDBACK))
        .collect()
}

/// Parses a batch reply. A single object counts as a one-element list;
/// entries without a usable id are dropped.
pub fn parse_batch_response(text: &str) -> Result<Vec<GradeResult>, EvaluatorError> {
    let payload = extract_json_payload(text);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| EvaluatorError::Malformed(format!("{e}: {}", preview(text))))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(_) => vec![value],
        other => {
            return Err(EvaluatorError::Malformed(format!(
                "expected a JSON array, got {}",
                preview(&other.to_string())
            )))
        }
    };

    let total = entries.len();
    let results: Vec<GradeResult> = entries.iter().filter_map(|entry| grade_entry(entry, None)).collect();
    if results.len() < total {
        warn!(dropped = total - results.len(), "evaluator entries without usable id");
    }
    Ok(results)
}

/// Parses a single-card reply; the id always comes from the card.
pub fn parse_card_response(text: &str, id: u32) -> Result<GradeResult, EvaluatorError> {
    let payload = extract_json_payload(text);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| EvaluatorError::Malformed(format!("{e}: {}", preview(text))))?;

    let entry = match value {
        Value::Array(mut entries) if !entries.is_empty() => entries.swap_remove(0),
        Value::Array(_) => Value::Null,
        other => other,
    };

    grade_entry(&entry, Some(id))
        .ok_or_else(|| EvaluatorError::Malformed("expected a JSON object".to_string()))
}

fn grade_entry(entry: &Value, fixed_id: Option<u32>) -> Option<GradeResult> {
    let object = entry.as_object()?;
    let id = match fixed_id {
        Some(id) => id,
        None => object.get("id").and_then(lenient_id)?,
    };

    let status = object
        .get("status")
        .and_then(Value::as_str)
        .map(GradeStatus::parse_lenient)
        .unwrap_or(GradeStatus::Fail);

    let transcript = ["user_said", "transcript"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or_default();
    let feedback = object.get("feedback").and_then(Value::as_str).unwrap_or_default();

    Some(GradeResult::new(id, status, transcript.trim(), feedback.trim()))
}

fn lenient_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().trim_start_matches("ID").trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(id).ok().filter(|id| *id > 0)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    let mut out: String = text.chars().take(LIMIT).collect();
    if text.chars().count() > LIMIT {
        out.push('…');
    }
    out
}
