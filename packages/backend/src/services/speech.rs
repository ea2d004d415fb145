//! Reference audio for display
//!
//! Learners can listen to the ESV target or the Chinese phrase. Audio comes
//! from an OpenAI-compatible `/audio/speech` endpoint and is cached on disk
//! keyed by voice and text.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use pulpit_algo::sanitize::clean_for_speech;

use crate::services::llm_provider::{env_string, env_u64, normalize_endpoint};

const DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    English,
    Chinese,
}

impl Voice {
    pub fn profile(&self) -> VoiceProfile {
        match self {
            Self::English => VoiceProfile::english(),
            Self::Chinese => VoiceProfile::chinese(),
        }
    }
}

/// Neural voice name and speaking-rate offset in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: &'static str,
    pub rate_percent: i8,
}

impl VoiceProfile {
    pub fn english() -> Self {
        Self {
            name: "en-US-ChristopherNeural",
            rate_percent: -10,
        }
    }

    pub fn chinese() -> Self {
        Self {
            name: "zh-CN-XiaoxiaoNeural",
            rate_percent: -5,
        }
    }

    /// e.g. "-10%"
    pub fn rate(&self) -> String {
        format!("{:+}%", self.rate_percent)
    }

    /// Rate as a speed multiplier (1.0 = normal)
    pub fn speed(&self) -> f32 {
        1.0 + f32::from(self.rate_percent) / 100.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech not configured: {0}")]
    NotConfigured(&'static str),
    #[error("nothing to read after cleanup")]
    EmptyText,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("cache error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// MP3 audio of `text` read with `voice`
    async fn synthesize(&self, text: &str, voice: VoiceProfile) -> Result<Bytes, SpeechError>;
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub cache_dir: PathBuf,
}

impl SpeechConfig {
    /// `TTS_*` keys, falling back to the LLM endpoint and key.
    pub fn from_env() -> Self {
        let api_key = env_string("TTS_API_KEY")
            .or_else(|| env_string("LLM_API_KEY"))
            .or_else(|| env_string("GEMINI_API_KEY"));
        let api_endpoint = normalize_endpoint(
            env_string("TTS_BASE_URL")
                .or_else(|| env_string("LLM_BASE_URL"))
                .unwrap_or_else(|| "https://api.laozhang.ai/v1".to_string()),
        );

        Self {
            api_key,
            api_endpoint,
            model: env_string("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            timeout: Duration::from_millis(env_u64("TTS_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS)),
            cache_dir: default_cache_dir(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pulpit-power")
        .join("tts")
}

/// sha256 over voice, rate and cleaned text
pub fn cache_key(text: &str, voice: VoiceProfile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice.name.as_bytes());
    hasher.update(b"|");
    hasher.update(voice.rate().as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct HttpSpeech {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl HttpSpeech {
    pub fn new(config: SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(SpeechConfig::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.config.is_available()
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.config.cache_dir.join(format!("{key}.mp3"))
    }

    async fn fetch(&self, text: &str, voice: VoiceProfile) -> Result<Bytes, SpeechError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SpeechError::NotConfigured("TTS_API_KEY"))?;

        let url = format!("{}/audio/speech", self.config.api_endpoint.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": voice.name,
            "speed": voice.speed(),
            "response_format": "mp3"
        });

        let resp = self.client.post(&url).bearer_auth(api_key).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::HttpStatus { status, body });
        }
        Ok(resp.bytes().await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeech {
    async fn synthesize(&self, text: &str, voice: VoiceProfile) -> Result<Bytes, SpeechError> {
        let text = clean_for_speech(text);
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let key = cache_key(&text, voice);
        let path = self.cache_path(&key);
        if let Ok(cached) = tokio::fs::read(&path).await {
            if !cached.is_empty() {
                debug!(key = %key, "speech cache hit");
                return Ok(Bytes::from(cached));
            }
        }

        let audio = self.fetch(&text, voice).await?;
        if let Err(err) = write_cache(&path, &audio).await {
            warn!(path = %path.display(), error = %err, "failed to cache speech");
        }
        Ok(audio)
    }
}

async fn write_cache(path: &Path, audio: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, audio).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline(cache_dir: PathBuf) -> HttpSpeech {
        HttpSpeech::new(SpeechConfig {
            api_key: None,
            api_endpoint: "http://127.0.0.1:9/v1".to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            timeout: Duration::from_millis(100),
            cache_dir,
        })
    }

    #[test]
    fn test_voice_profiles() {
        assert_eq!(VoiceProfile::english().name, "en-US-ChristopherNeural");
        assert_eq!(VoiceProfile::english().rate(), "-10%");
        assert_eq!(VoiceProfile::chinese().rate(), "-5%");
        assert!((VoiceProfile::english().speed() - 0.9).abs() < 1e-6);
        assert_eq!(Voice::Chinese.profile(), VoiceProfile::chinese());
    }

    #[test]
    fn test_cache_key_depends_on_voice_and_text() {
        let a = cache_key("In the beginning", VoiceProfile::english());
        let b = cache_key("In the beginning", VoiceProfile::chinese());
        let c = cache_key("In the beginning.", VoiceProfile::english());
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cache_key("In the beginning", VoiceProfile::english()));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let speech = offline(tmp.path().to_path_buf());
        assert!(matches!(
            speech.synthesize("**  __ **", VoiceProfile::english()).await,
            Err(SpeechError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let tmp = tempfile::tempdir().unwrap();
        let speech = offline(tmp.path().to_path_buf());
        let key = cache_key("I will establish my covenant", VoiceProfile::english());
        std::fs::write(tmp.path().join(format!("{key}.mp3")), b"ID3cached").unwrap();

        let audio = speech
            .synthesize("**I will establish** my covenant", VoiceProfile::english())
            .await
            .unwrap();
        assert_eq!(audio.as_ref(), b"ID3cached");
    }

    #[tokio::test]
    async fn test_cache_miss_without_key_is_not_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let speech = offline(tmp.path().to_path_buf());
        assert!(matches!(
            speech.synthesize("the flesh", VoiceProfile::english()).await,
            Err(SpeechError::NotConfigured(_))
        ));
    }
}
