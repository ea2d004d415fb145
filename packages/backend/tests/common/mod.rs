#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use pulpit_algo::{GradeResult, GradeStatus};
use pulpit_backend::config::Config;
use pulpit_backend::library::Library;
use pulpit_backend::services::evaluator::{BatchSubmission, CardSubmission, Evaluator, EvaluatorError};
use pulpit_backend::services::speech::{SpeechError, SpeechSynthesizer, VoiceProfile};
use pulpit_backend::state::AppState;

const GENESIS: &str = r#"[
  {"id": 1, "ref": "Gen 17:7", "phrase_cn": "坚定我的约", "phrase_en": "establish my covenant", "trap": "make my promise"},
  {"id": 2, "ref": "Gen 6:12", "phrase_cn": "凡有血气的人", "phrase_en": "all flesh"},
  {"id": 3, "ref": "Gen 22:8", "phrase_cn": "神必自己预备", "phrase_en": "God will provide for himself"}
]"#;

const EXODUS: &str = r#"[
  {"id": 1, "ref": "Exod 6:6", "phrase_cn": "救赎你们", "phrase_en": "redeem you"}
]"#;

#[derive(Debug, Clone)]
pub enum Behavior {
    PassAll,
    FailIds(Vec<u32>),
    /// Says nothing was heard, with a `pass` status
    Silent,
    Malformed,
}

/// Pauses `grade_batch` until released
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

pub struct FakeEvaluator {
    behavior: Mutex<Behavior>,
    gate: Mutex<Option<Gate>>,
    calls: AtomicUsize,
}

impl FakeEvaluator {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(Behavior::PassAll),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn gate(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock() = Some(Gate {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        (entered, release)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn grade(&self, id: u32, expected: &str) -> Result<GradeResult, EvaluatorError> {
        match &*self.behavior.lock() {
            Behavior::PassAll => Ok(GradeResult::new(id, GradeStatus::Pass, expected, "好")),
            Behavior::FailIds(ids) if ids.contains(&id) => {
                Ok(GradeResult::new(id, GradeStatus::Fail, "make", "用强动词"))
            }
            Behavior::FailIds(_) => Ok(GradeResult::new(id, GradeStatus::Warning, expected, "")),
            Behavior::Silent => Ok(GradeResult::new(id, GradeStatus::Pass, "No audio detected", "")),
            Behavior::Malformed => Err(EvaluatorError::Malformed("not json".to_string())),
        }
    }
}

#[async_trait]
impl Evaluator for FakeEvaluator {
    async fn grade_batch(&self, submission: BatchSubmission) -> Result<Vec<GradeResult>, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        submission
            .items
            .iter()
            .map(|item| self.grade(item.id, &item.target_phrase))
            .collect()
    }

    async fn grade_card(&self, submission: CardSubmission) -> Result<GradeResult, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.grade(submission.item.id, &submission.item.target_phrase)
    }
}

pub struct FakeSpeech;

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, voice: VoiceProfile) -> Result<bytes::Bytes, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }
        Ok(bytes::Bytes::from(format!("ID3:{}:{}", voice.name, text)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub evaluator: Arc<FakeEvaluator>,
    _data_dir: TempDir,
}

pub async fn create_test_app() -> TestApp {
    build(false, Config::default().max_audio_bytes)
}

pub async fn create_test_app_with_speech() -> TestApp {
    build(true, Config::default().max_audio_bytes)
}

pub async fn create_test_app_with_audio_limit(max_audio_bytes: usize) -> TestApp {
    build(false, max_audio_bytes)
}

fn build(with_speech: bool, max_audio_bytes: usize) -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    std::fs::write(data_dir.path().join("Genesis.json"), GENESIS).unwrap();
    std::fs::write(data_dir.path().join("Exodus.json"), EXODUS).unwrap();
    std::fs::write(data_dir.path().join("blueprint_strong_verbs.json"), "[]").unwrap();

    let config = Config {
        data_dir: data_dir.path().to_path_buf(),
        batch_size: 2,
        max_audio_bytes,
        ..Config::default()
    };
    let library = Library::load_dir(&config.data_dir).unwrap();
    let evaluator = Arc::new(FakeEvaluator::new());
    let speech: Option<Arc<dyn SpeechSynthesizer>> = if with_speech {
        Some(Arc::new(FakeSpeech))
    } else {
        None
    };

    let state = AppState::new(config, library, evaluator.clone(), speech);
    TestApp {
        router: pulpit_backend::build_app(state.clone()),
        state,
        evaluator,
        _data_dir: data_dir,
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        read_json(self.router.clone().oneshot(request).await.unwrap()).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn submit_audio(&self, session: &str, audio: &'static [u8]) -> (StatusCode, Value) {
        self.submit_recording(session, Bytes::from_static(audio), "audio/webm").await
    }

    pub async fn submit_recording(
        &self,
        session: &str,
        audio: impl Into<Bytes>,
        content_type: &str,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/sessions/{session}/submission"))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(audio.into()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Creates a session on `book` and returns its id.
    pub async fn session_on(&self, book: &str) -> String {
        let (status, body) = self.post("/api/sessions", serde_json::json!({ "book": book })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}
