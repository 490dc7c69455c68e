//! Per-utterance pipeline types and the outbound delivery record.

use crate::buffer::frame::AudioSpan;
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

/// Lifecycle of one utterance through the pipeline. Forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    Buffered,
    Transcribing,
    Translating,
    Synthesizing,
    Delivered,
    Failed,
}

impl UtteranceState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Buffered => 0,
            Self::Transcribing => 1,
            Self::Translating => 2,
            Self::Synthesizing => 3,
            Self::Delivered => 4,
            Self::Failed => 4,
        }
    }
}

/// One bounded span of speech moving through the pipeline.
#[derive(Debug)]
pub struct Utterance {
    pub session_id: String,
    /// Strictly increasing per session.
    pub sequence: u64,
    pub audio: AudioSpan,
    pub created_at: Instant,
    state: UtteranceState,
}

impl Utterance {
    pub fn new(session_id: impl Into<String>, sequence: u64, audio: AudioSpan) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
            audio,
            created_at: Instant::now(),
            state: UtteranceState::Buffered,
        }
    }

    pub fn state(&self) -> UtteranceState {
        self.state
    }

    /// Advances the lifecycle. Backward and past-terminal transitions are
    /// rejected and logged rather than applied.
    pub fn advance(&mut self, next: UtteranceState) {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            warn!(
                session_id = %self.session_id,
                sequence = self.sequence,
                from = ?self.state,
                to = ?next,
                "rejected utterance state transition"
            );
            return;
        }
        self.state = next;
    }
}

/// Model version labels pinned when a session is created. Never mutated
/// afterwards, so a deployment-wide model change cannot shift results
/// mid-conversation.
#[derive(Debug, Clone)]
pub struct ModelLabels {
    pub transcriber: String,
    pub translator: String,
    pub synthesizer: String,
}

/// Immutable session parameters captured once per utterance, so a language
/// swap mid-flight never affects work already started.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub source_language: String,
    pub target_language: String,
    pub voice_profile: String,
    pub models: ModelLabels,
}

/// What the delivery carries relative to a fully successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Translated text plus synthesized audio.
    Full,
    /// Translated (or passthrough) text, no audio.
    TextOnly,
    /// The original utterance audio, untranslated.
    PassthroughAudio,
    /// Explicit gap marker; nothing usable was produced.
    Dropped,
}

/// Per-delivery quality figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub stt_confidence: f32,
    pub mt_confidence: f32,
    pub voice_quality: f32,
    pub overall_quality: f32,
}

/// Per-delivery timing figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_time_ms: u64,
    pub met_target: bool,
}

/// Outbound result for one admitted utterance. Every admitted utterance
/// produces exactly one of these, degraded modes included.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub session_id: String,
    pub sequence_number: u64,
    pub source_text: String,
    pub translated_text: String,
    /// Synthesized speech for `full`; the original utterance audio for
    /// `passthrough-audio`; absent otherwise.
    pub synthesized_audio: Option<Vec<u8>>,
    pub quality: QualityMetrics,
    pub performance: PerformanceMetrics,
    pub delivery_mode: DeliveryMode,
}

impl Delivery {
    /// Gap marker for an utterance that never entered the pipeline, e.g.
    /// one rejected by the concurrency limiter.
    pub fn dropped(session_id: impl Into<String>, sequence_number: u64, total_time_ms: u64) -> Self {
        Self {
            session_id: session_id.into(),
            sequence_number,
            source_text: String::new(),
            translated_text: String::new(),
            synthesized_audio: None,
            quality: QualityMetrics {
                stt_confidence: 0.0,
                mt_confidence: 0.0,
                voice_quality: 0.0,
                overall_quality: 0.0,
            },
            performance: PerformanceMetrics {
                total_time_ms,
                met_target: false,
            },
            delivery_mode: DeliveryMode::Dropped,
        }
    }
}
