//! Uniform asynchronous wrapper around one engine invocation.
//!
//! Every stage call goes through `StageRunner::invoke`, which enforces the
//! per-stage timeout, retries transient failures exactly once, and folds all
//! failure modes into a failed `StageResult`. Nothing an engine does can
//! escape the runner as an error return.

use crate::engine::traits::{EngineError, EngineResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

/// The three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Transcribe,
    Translate,
    Synthesize,
}

impl Stage {
    /// Stage name for logs and result payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output payload of one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePayload {
    Text(String),
    Audio(Vec<u8>),
}

impl StagePayload {
    /// Returns the text payload, if this is a text result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StagePayload::Text(text) => Some(text),
            StagePayload::Audio(_) => None,
        }
    }

    /// Returns the audio payload, if this is an audio result.
    pub fn as_audio(&self) -> Option<&[u8]> {
        match self {
            StagePayload::Audio(audio) => Some(audio),
            StagePayload::Text(_) => None,
        }
    }
}

/// Result of one stage invocation, successful or not.
///
/// Ephemeral: consumed by the orchestrator and the quality aggregator,
/// never persisted beyond the utterance.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub payload: Option<StagePayload>,
    /// Engine confidence in [0, 1]; 0.0 on failure.
    pub confidence: f32,
    pub latency_ms: u64,
    pub succeeded: bool,
    /// Failure description when `succeeded` is false.
    pub failure: Option<String>,
}

impl StageResult {
    fn success(stage: Stage, payload: StagePayload, confidence: f32, latency_ms: u64) -> Self {
        Self {
            stage,
            payload: Some(payload),
            confidence: confidence.clamp(0.0, 1.0),
            latency_ms,
            succeeded: true,
            failure: None,
        }
    }

    fn failed(stage: Stage, reason: String, latency_ms: u64) -> Self {
        Self {
            stage,
            payload: None,
            confidence: 0.0,
            latency_ms,
            succeeded: false,
            failure: Some(reason),
        }
    }
}

/// Retry and timeout policy for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageRunnerConfig {
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// Runs one stage invocation under the configured policy.
pub struct StageRunner {
    stage: Stage,
    config: StageRunnerConfig,
}

impl StageRunner {
    /// Creates a runner for the given stage with a per-attempt timeout.
    pub fn new(stage: Stage, stage_timeout: Duration) -> Self {
        Self {
            stage,
            config: StageRunnerConfig {
                timeout: stage_timeout,
            },
        }
    }

    /// Invokes the engine call, returning a `StageResult` in all cases.
    ///
    /// Timeouts cancel the in-flight call (the future is dropped) and fail
    /// the stage. A transient failure is retried exactly once, with a fresh
    /// timeout; validation failures are never retried.
    pub async fn invoke<F, Fut>(&self, mut call: F) -> StageResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<(StagePayload, f32)>>,
    {
        let start = Instant::now();
        let mut retried = false;

        loop {
            match timeout(self.config.timeout, call()).await {
                Ok(Ok((payload, confidence))) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    debug!(stage = %self.stage, latency_ms, confidence, "stage completed");
                    return StageResult::success(self.stage, payload, confidence, latency_ms);
                }
                Ok(Err(error @ EngineError::Transient { .. })) if !retried => {
                    warn!(stage = %self.stage, %error, "transient stage failure, retrying once");
                    retried = true;
                }
                Ok(Err(error)) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    warn!(stage = %self.stage, %error, latency_ms, "stage failed");
                    return StageResult::failed(self.stage, error.to_string(), latency_ms);
                }
                Err(_) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    warn!(stage = %self.stage, latency_ms, "stage timed out");
                    return StageResult::failed(
                        self.stage,
                        format!("timed out after {:?}", self.config.timeout),
                        latency_ms,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn invoke_returns_success_payload() {
        let runner = StageRunner::new(Stage::Transcribe, Duration::from_millis(100));
        let result = runner
            .invoke(|| async { Ok((StagePayload::Text("hello".to_string()), 0.9)) })
            .await;

        assert!(result.succeeded);
        assert_eq!(result.stage, Stage::Transcribe);
        assert_eq!(result.payload.unwrap().as_text(), Some("hello"));
        assert_eq!(result.confidence, 0.9);
        assert!(result.failure.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_times_out_and_fails() {
        let runner = StageRunner::new(Stage::Synthesize, Duration::from_millis(50));
        let result = runner
            .invoke(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok((StagePayload::Audio(vec![0u8; 8]), 0.9))
            })
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.confidence, 0.0);
        assert!(result.payload.is_none());
        assert!(result.failure.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_exactly_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let runner = StageRunner::new(Stage::Translate, Duration::from_millis(100));

        let counter = attempts.clone();
        let result = runner
            .invoke(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(EngineError::transient("connection reset"))
                    } else {
                        Ok((StagePayload::Text("second try".to_string()), 0.8))
                    }
                }
            })
            .await;

        assert!(result.succeeded);
        assert_eq!(result.payload.unwrap().as_text(), Some("second try"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_transient_failure_fails_after_one_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let runner = StageRunner::new(Stage::Translate, Duration::from_millis(100));

        let counter = attempts.clone();
        let result = runner
            .invoke(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(StagePayload, f32), _>(EngineError::transient("still down"))
                }
            })
            .await;

        assert!(!result.succeeded);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn validation_failure_is_never_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let runner = StageRunner::new(Stage::Transcribe, Duration::from_millis(100));

        let counter = attempts.clone();
        let result = runner
            .invoke(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(StagePayload, f32), _>(EngineError::validation("bad input"))
                }
            })
            .await;

        assert!(!result.succeeded);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(result.failure.unwrap().contains("bad input"));
    }

    #[tokio::test]
    async fn confidence_is_clamped_to_unit_interval() {
        let runner = StageRunner::new(Stage::Transcribe, Duration::from_millis(100));
        let result = runner
            .invoke(|| async { Ok((StagePayload::Text("x".to_string()), 3.5)) })
            .await;
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_reflects_elapsed_time() {
        let runner = StageRunner::new(Stage::Translate, Duration::from_millis(500));
        let result = runner
            .invoke(|| async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok((StagePayload::Text("x".to_string()), 0.9))
            })
            .await;

        assert!(result.succeeded);
        assert_eq!(result.latency_ms, 120);
    }

    #[test]
    fn stage_payload_accessors() {
        let text = StagePayload::Text("abc".to_string());
        assert_eq!(text.as_text(), Some("abc"));
        assert!(text.as_audio().is_none());

        let audio = StagePayload::Audio(vec![1, 2]);
        assert_eq!(audio.as_audio(), Some(&[1u8, 2][..]));
        assert!(audio.as_text().is_none());
    }
}
