//! Common Types and Constants
//!
//! Shared data structures used by the queue, the evaluator boundary and the
//! offline data tools.

use serde::{Deserialize, Deserializer, Serialize};

use crate::sanitize::is_silent_transcript;

// ==================== Constants ====================

/// Items handed to the learner per submission round
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Transcript stored on results whose recording was empty or inaudible
pub const NO_AUDIO_TRANSCRIPT: &str = "NO_AUDIO";

/// Feedback used when a silent result arrives without any
pub const NO_AUDIO_FEEDBACK: &str = "未录音或未说出";

// ==================== Practice Items ====================

/// One practice phrase: a Chinese (CUV) source and its ESV target.
///
/// Field names follow the on-disk book format (`phrase_cn`, `phrase_en`,
/// `ref`, `trap`, ...). Legacy spellings are migrated by the library
/// normalizer, not accepted here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeItem {
    /// Stable, unique, positive id within a book
    pub id: u32,
    /// Text in the source language
    #[serde(rename = "phrase_cn")]
    pub source_phrase: String,
    /// Expected translation
    #[serde(rename = "phrase_en")]
    pub target_phrase: String,
    #[serde(flatten)]
    pub meta: ItemMetadata,
}

impl PracticeItem {
    pub fn new(id: u32, source_phrase: impl Into<String>, target_phrase: impl Into<String>) -> Self {
        Self {
            id,
            source_phrase: source_phrase.into(),
            target_phrase: target_phrase.into(),
            meta: ItemMetadata::default(),
        }
    }

    pub fn with_meta(mut self, meta: ItemMetadata) -> Self {
        self.meta = meta;
        self
    }
}

/// Optional context attached to a practice item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Verse citation, e.g. "Gen 17:7"
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_term: Option<String>,
    /// Literal ("Chinglish") renderings to avoid
    #[serde(
        rename = "trap",
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub traps: Vec<String>,
    /// Full ESV sentence the phrase comes from
    #[serde(rename = "sentence_context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuance_note: Option<String>,
}

/// Accepts `"trap"`, `["a", "b"]`, scalars and null; blank entries are dropped.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(trap_entries(value.unwrap_or(serde_json::Value::Null)))
}

/// Flattens a stored trap value into trimmed, non-blank entries.
pub fn trap_entries(value: serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    let raw = match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(values) => values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect(),
        other => vec![other.to_string()],
    };

    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ==================== Grading ====================

/// Traffic-light verdict returned by the evaluator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Pass,
    Warning,
    Fail,
}

impl GradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warning => "warning",
            Self::Fail => "fail",
        }
    }

    /// Case-insensitive parse. Anything unrecognised counts as a failure.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pass" | "passed" | "green" => Self::Pass,
            "warning" | "warn" | "yellow" => Self::Warning,
            _ => Self::Fail,
        }
    }

    /// Pass and warning both retire the item for the current load cycle
    pub fn retires_item(&self) -> bool {
        matches!(self, Self::Pass | Self::Warning)
    }
}

impl<'de> Deserialize<'de> for GradeStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse_lenient).unwrap_or(Self::Fail))
    }
}

impl std::fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluator verdict for one practice item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub id: u32,
    pub status: GradeStatus,
    /// What the evaluator heard
    #[serde(default, alias = "user_said")]
    pub transcript: String,
    #[serde(default)]
    pub feedback: String,
}

impl GradeResult {
    pub fn new(
        id: u32,
        status: GradeStatus,
        transcript: impl Into<String>,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            id,
            status,
            transcript: transcript.into(),
            feedback: feedback.into(),
        }
    }

    /// Local fallback for an item whose recording was empty
    pub fn silent(id: u32, feedback: impl Into<String>) -> Self {
        Self::new(id, GradeStatus::Fail, NO_AUDIO_TRANSCRIPT, feedback)
    }

    /// Forces `fail` when the transcript says nothing was heard, whatever
    /// status the evaluator reported.
    pub fn sanitized(mut self) -> Self {
        if is_silent_transcript(&self.transcript) {
            self.status = GradeStatus::Fail;
            self.transcript = NO_AUDIO_TRANSCRIPT.to_string();
            if self.feedback.trim().is_empty() {
                self.feedback = NO_AUDIO_FEEDBACK.to_string();
            }
        }
        self
    }

    pub fn is_silent(&self) -> bool {
        is_silent_transcript(&self.transcript)
    }
}

// ==================== Errors ====================

/// Malformed item list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("item at position {index} has id 0; ids must be positive")]
    ZeroId { index: usize },
    #[error("duplicate item id {0}")]
    DuplicateId(u32),
    #[error("item {id} has an empty {field}")]
    EmptyField { id: u32, field: &'static str },
}
