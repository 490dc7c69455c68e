//! Engine trait contracts and test mocks.

use crate::buffer::frame::AudioSpan;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure taxonomy for engine invocations.
///
/// The runner retries `Transient` exactly once; `Validation` is never
/// retried. Timeouts are enforced by the runner, not the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("transient engine failure: {message}")]
    Transient { message: String },

    #[error("engine rejected input: {message}")]
    Validation { message: String },
}

impl EngineError {
    /// Shorthand for a transient (retryable) failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Shorthand for a validation (non-retryable) failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if the failure is worth one retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Transcription output: text plus engine confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
}

/// Translation output: text plus engine confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub text: String,
    pub confidence: f32,
}

/// Synthesis output: audio bytes plus voice quality estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub confidence: f32,
}

/// Speech-to-text engine contract.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes an audio span. `source_language` is a hint, not a demand.
    async fn transcribe(&self, audio: &AudioSpan, source_language: &str)
    -> EngineResult<Transcription>;

    /// Engine name for logs and monitoring.
    fn name(&self) -> &str;
}

/// Text translation engine contract.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> EngineResult<Translation>;

    fn name(&self) -> &str;
}

/// Voice synthesis engine contract.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes speech for `text` using the stored voice profile.
    async fn synthesize(
        &self,
        text: &str,
        target_language: &str,
        voice_profile: &str,
    ) -> EngineResult<Synthesis>;

    fn name(&self) -> &str;
}

/// The three engines bound for a deployment, shared across sessions.
#[derive(Clone)]
pub struct EngineSet {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl EngineSet {
    /// Binds the built-in deterministic engines.
    pub fn deterministic() -> Self {
        use crate::engine::deterministic::*;
        Self {
            transcriber: Arc::new(DeterministicTranscriber::default()),
            translator: Arc::new(DeterministicTranslator::default()),
            synthesizer: Arc::new(DeterministicSynthesizer::default()),
        }
    }
}

// ── Test mocks ─────────────────────────────────────────────────────────

/// Mock transcriber with builder-style configuration.
pub struct MockTranscriber {
    response: String,
    confidence: f32,
    failure: Option<EngineError>,
    delay: Option<std::time::Duration>,
    invocations: std::sync::atomic::AtomicU32,
    /// None = fail every call (when `failure` is set); Some(n) = fail first n.
    fail_times: std::sync::Mutex<Option<u32>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            response: "mock transcription".to_string(),
            confidence: 0.95,
            failure: None,
            delay: None,
            invocations: std::sync::atomic::AtomicU32::new(0),
            fail_times: std::sync::Mutex::new(None),
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_failure(mut self, failure: EngineError) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Fail the first `n` invocations, then succeed.
    pub fn failing_first(mut self, n: u32, failure: EngineError) -> Self {
        self.fail_times = std::sync::Mutex::new(Some(n));
        self.failure = Some(failure);
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<EngineError> {
        let failure = self.failure.clone()?;
        let mut guard = self.fail_times.lock().ok()?;
        match *guard {
            None => Some(failure),
            Some(0) => None,
            Some(n) => {
                *guard = Some(n - 1);
                Some(failure)
            }
        }
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        _audio: &AudioSpan,
        _source_language: &str,
    ) -> EngineResult<Transcription> {
        self.invocations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.next_failure() {
            return Err(failure);
        }
        Ok(Transcription {
            text: self.response.clone(),
            confidence: self.confidence,
        })
    }

    fn name(&self) -> &str {
        "mock-transcriber"
    }
}

/// Mock translator with builder-style configuration.
pub struct MockTranslator {
    response: Option<String>,
    confidence: f32,
    failure: Option<EngineError>,
    delay: Option<std::time::Duration>,
    invocations: std::sync::atomic::AtomicU32,
    last_input: std::sync::Mutex<Option<String>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            response: None,
            confidence: 0.9,
            failure: None,
            delay: None,
            invocations: std::sync::atomic::AtomicU32::new(0),
            last_input: std::sync::Mutex::new(None),
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_failure(mut self, failure: EngineError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The text passed to the most recent `translate` call.
    pub fn last_input(&self) -> Option<String> {
        self.last_input.lock().ok().and_then(|g| g.clone())
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_language: &str,
        target_language: &str,
    ) -> EngineResult<Translation> {
        self.invocations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut guard) = self.last_input.lock() {
            *guard = Some(text.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.failure.clone() {
            return Err(failure);
        }
        let text = self
            .response
            .clone()
            .unwrap_or_else(|| format!("[{target_language}] {text}"));
        Ok(Translation {
            text,
            confidence: self.confidence,
        })
    }

    fn name(&self) -> &str {
        "mock-translator"
    }
}

/// Mock synthesizer with builder-style configuration.
pub struct MockSynthesizer {
    audio: Vec<u8>,
    confidence: f32,
    failure: Option<EngineError>,
    delay: Option<std::time::Duration>,
    invocations: std::sync::atomic::AtomicU32,
    last_input: std::sync::Mutex<Option<String>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            audio: vec![0u8; 320],
            confidence: 0.85,
            failure: None,
            delay: None,
            invocations: std::sync::atomic::AtomicU32::new(0),
            last_input: std::sync::Mutex::new(None),
        }
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_failure(mut self, failure: EngineError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The text passed to the most recent `synthesize` call.
    pub fn last_input(&self) -> Option<String> {
        self.last_input.lock().ok().and_then(|g| g.clone())
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _target_language: &str,
        _voice_profile: &str,
    ) -> EngineResult<Synthesis> {
        self.invocations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Ok(mut guard) = self.last_input.lock() {
            *guard = Some(text.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.failure.clone() {
            return Err(failure);
        }
        Ok(Synthesis {
            audio: self.audio.clone(),
            confidence: self.confidence,
        })
    }

    fn name(&self) -> &str {
        "mock-synthesizer"
    }
}
