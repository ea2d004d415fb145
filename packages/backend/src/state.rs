use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::library::Library;
use crate::services::evaluator::{Evaluator, LlmEvaluator};
use crate::services::speech::{HttpSpeech, SpeechSynthesizer};
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    config: Arc<Config>,
    library: Arc<Library>,
    sessions: Arc<SessionStore>,
    evaluator: Arc<dyn Evaluator>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl AppState {
    pub fn new(
        config: Config,
        library: Library,
        evaluator: Arc<dyn Evaluator>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            config: Arc::new(config),
            library: Arc::new(library),
            sessions: Arc::new(SessionStore::new()),
            evaluator,
            speech,
        }
    }

    /// LLM evaluator and HTTP speech from the environment. Speech is left
    /// out when no key is configured.
    pub fn from_env(config: Config, library: Library) -> Self {
        let evaluator = LlmEvaluator::from_env();
        if !evaluator.is_available() {
            tracing::warn!("LLM_API_KEY not set; submissions will be rejected");
        }

        let speech = HttpSpeech::from_env();
        let speech: Option<Arc<dyn SpeechSynthesizer>> = if speech.is_available() {
            Some(Arc::new(speech))
        } else {
            tracing::info!("speech disabled (no TTS key)");
            None
        };

        Self::new(config, library, Arc::new(evaluator), speech)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn library(&self) -> Arc<Library> {
        Arc::clone(&self.library)
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn evaluator(&self) -> Arc<dyn Evaluator> {
        Arc::clone(&self.evaluator)
    }

    pub fn speech(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        self.speech.clone()
    }
}
