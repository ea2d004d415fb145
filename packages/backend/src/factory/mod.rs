//! Offline book generation
//!
//! Builds practice books from a blueprint by asking an LLM for cards in
//! rounds. Each round forbids the references already used; candidates that
//! still repeat one are dropped. Three unproductive rounds in a row end the
//! book early.

mod prompts;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use pulpit_algo::sanitize::extract_json_payload;
use pulpit_algo::{Book, PracticeItem, ReferencePolicy, ReferenceSet};

use crate::services::llm_provider::{ChatMessage, LLMError, LLMProvider};

pub use prompts::{FORBIDDEN_LIMIT, FORBIDDEN_OVERFLOW};

pub const DEFAULT_TARGET: usize = 30;
pub const DEFAULT_BATCH: usize = 10;
pub const DEFAULT_MAX_FAILURES: usize = 3;

const BASE_TEMPERATURE: f32 = 0.7;
const TEMPERATURE_SPAN: f32 = 0.2;
const MAX_TEMPERATURE: f32 = 1.3;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid blueprint {path}: {source}")]
    Blueprint {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize {book}: {source}")]
    Serialize {
        book: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("llm unavailable: {0}")]
    Llm(#[from] LLMError),
}

/// One book to generate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blueprint {
    pub book: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub key_verbs: Value,
    #[serde(default)]
    pub chinglish_traps: Value,
    #[serde(default)]
    pub strong_verb_focus: Vec<Value>,
}

pub fn load_blueprints(path: impl AsRef<Path>) -> Result<Vec<Blueprint>, FactoryError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| FactoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| FactoryError::Blueprint {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct FactoryConfig {
    /// Items wanted per book
    pub target: usize,
    /// Items requested per mining round
    pub batch: usize,
    /// Consecutive unproductive rounds before giving up on a book
    pub max_failures: usize,
    pub policy: ReferencePolicy,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET,
            batch: DEFAULT_BATCH,
            max_failures: DEFAULT_MAX_FAILURES,
            policy: ReferencePolicy::default(),
        }
    }
}

impl FactoryConfig {
    /// Rises with progress so later rounds wander further from the obvious
    /// verses.
    pub fn temperature(&self, collected: usize) -> f32 {
        let fraction = if self.target == 0 {
            1.0
        } else {
            collected as f32 / self.target as f32
        };
        (BASE_TEMPERATURE + fraction * TEMPERATURE_SPAN).min(MAX_TEMPERATURE)
    }
}

/// Text completion that is expected to hold JSON
#[async_trait]
pub trait JsonCompletion: Send + Sync {
    async fn complete_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, LLMError>;
}

#[async_trait]
impl JsonCompletion for LLMProvider {
    async fn complete_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, LLMError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        self.complete(&messages, Some(temperature)).await
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookReport {
    pub book: String,
    pub items: usize,
    pub focus_items: usize,
    pub rounds: usize,
    pub duplicates: usize,
    /// Cards that would not load as a practice item
    pub invalid: usize,
    /// Stopped by the failure limit before reaching the target
    pub exhausted: bool,
}

pub struct GeneratedBook {
    pub items: Vec<Map<String, Value>>,
    pub report: BookReport,
}

pub struct PhraseFactory<C> {
    client: C,
    config: FactoryConfig,
}

impl<C: JsonCompletion> PhraseFactory<C> {
    pub fn new(client: C, config: FactoryConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub async fn build_book(&self, blueprint: &Blueprint) -> Result<GeneratedBook, FactoryError> {
        let mut items: Vec<Map<String, Value>> = Vec::new();
        let mut seen = ReferenceSet::new(self.config.policy);
        let mut report = BookReport {
            book: blueprint.book.clone(),
            ..BookReport::default()
        };
        info!(book = %blueprint.book, target = self.config.target, "processing book");

        if !blueprint.strong_verb_focus.is_empty() {
            let prompt = prompts::focus_prompt(&blueprint.strong_verb_focus);
            let cards = self.request(&prompt, BASE_TEMPERATURE).await?;
            if cards.is_empty() {
                warn!(book = %blueprint.book, "no cards returned for strong verb focus");
            }
            for card in cards {
                if let Err(reason) = validate_card(&card) {
                    debug!(book = %blueprint.book, reference = reference_of(&card), %reason, "focus card rejected");
                    report.invalid += 1;
                    continue;
                }
                seen.insert(reference_of(&card));
                items.push(card);
            }
            report.focus_items = items.len();
            info!(book = %blueprint.book, count = items.len(), "strong verb cards added");
        }

        let mut failures = 0;
        while items.len() < self.config.target && failures < self.config.max_failures {
            let wanted = (self.config.target - items.len()).min(self.config.batch.max(1));
            let temperature = self.config.temperature(items.len());
            let forbidden = prompts::forbidden_list(seen.joined());
            report.rounds += 1;
            debug!(
                book = %blueprint.book,
                wanted,
                avoid = seen.len(),
                temperature,
                "mining round"
            );

            let prompt = prompts::mining_prompt(blueprint, wanted, &forbidden);
            let candidates = self.request(&prompt, temperature).await?;
            if candidates.is_empty() {
                failures += 1;
                warn!(book = %blueprint.book, failures, "round returned nothing");
                continue;
            }

            let mut added = 0;
            for candidate in candidates {
                if let Err(reason) = validate_card(&candidate) {
                    debug!(book = %blueprint.book, reference = reference_of(&candidate), %reason, "candidate rejected");
                    report.invalid += 1;
                } else if seen.insert(reference_of(&candidate)) {
                    items.push(candidate);
                    added += 1;
                } else {
                    report.duplicates += 1;
                }
            }

            if added > 0 {
                failures = 0;
                info!(book = %blueprint.book, added, total = items.len(), "round added items");
            } else {
                failures += 1;
                warn!(book = %blueprint.book, failures, "round yielded nothing usable");
            }
        }

        for (index, item) in items.iter_mut().enumerate() {
            item.insert("id".to_string(), Value::from(index as u64 + 1));
        }

        report.items = items.len();
        report.exhausted = items.len() < self.config.target;
        if report.exhausted {
            warn!(book = %blueprint.book, items = items.len(), "stopped short of target");
        }
        Ok(GeneratedBook { items, report })
    }

    /// One generation call. Transport and parse failures count as an empty
    /// round; a missing key aborts.
    async fn request(&self, prompt: &str, temperature: f32) -> Result<Vec<Map<String, Value>>, FactoryError> {
        match self
            .client
            .complete_json(prompts::GENERATOR_SYSTEM, prompt, temperature)
            .await
        {
            Ok(text) => Ok(parse_candidates(&text)),
            Err(err @ LLMError::NotConfigured(_)) => Err(FactoryError::Llm(err)),
            Err(err) => {
                warn!(error = %err, "generation call failed");
                Ok(Vec::new())
            }
        }
    }
}

/// Checks a card the way the library will load it, under a provisional id.
fn validate_card(card: &Map<String, Value>) -> Result<(), String> {
    let mut candidate = card.clone();
    candidate.insert("id".to_string(), Value::from(1u32));
    let item: PracticeItem = serde_json::from_value(Value::Object(candidate)).map_err(|err| err.to_string())?;
    Book::new(vec![item]).map(drop).map_err(|err| err.to_string())
}

fn reference_of(item: &Map<String, Value>) -> &str {
    item.get("ref").and_then(Value::as_str).unwrap_or_default()
}

/// JSON objects of a reply; anything unparsable yields nothing.
pub fn parse_candidates(text: &str) -> Vec<Map<String, Value>> {
    let payload = extract_json_payload(text);
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Ok(Value::Object(map)) => vec![map],
        Ok(_) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "reply is not JSON");
            Vec::new()
        }
    }
}

/// Writes `<out_dir>/<book>.json`, pretty printed.
pub fn write_book(out_dir: &Path, book: &str, items: &[Map<String, Value>]) -> Result<PathBuf, FactoryError> {
    std::fs::create_dir_all(out_dir).map_err(|source| FactoryError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let path = out_dir.join(format!("{book}.json"));
    let mut body = serde_json::to_string_pretty(items).map_err(|source| FactoryError::Serialize {
        book: book.to_string(),
        source,
    })?;
    body.push('\n');
    std::fs::write(&path, body).map_err(|source| FactoryError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
