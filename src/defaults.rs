//! Default configuration constants for lingolink.
//!
//! Shared across configuration types to keep the pipeline, session manager,
//! and limiter in agreement about timing and capacity defaults.

/// End-to-end latency budget per utterance in milliseconds.
///
/// The pipeline checks remaining budget before starting each stage; once it
/// is exhausted the utterance skips straight to the best available fallback.
pub const LATENCY_TARGET_MS: u64 = 400;

/// Soft share of the latency budget allocated to transcription.
pub const TRANSCRIBE_BUDGET_SHARE: f64 = 0.35;

/// Soft share of the latency budget allocated to translation.
pub const TRANSLATE_BUDGET_SHARE: f64 = 0.15;

/// Soft share of the latency budget allocated to synthesis.
pub const SYNTHESIZE_BUDGET_SHARE: f64 = 0.50;

/// Maximum in-flight utterance pipelines across all sessions.
pub const MAX_CONCURRENT_STREAMS: usize = 100;

/// Queue depth multiplier: utterances waiting for a slot beyond the limit.
pub const QUEUE_DEPTH_FACTOR: usize = 2;

/// How long a queued utterance waits for a slot before it is rejected
/// with a capacity failure, in milliseconds.
pub const QUEUE_GRACE_MS: u64 = 200;

/// Silence duration that ends an utterance, in milliseconds.
///
/// 300ms is short enough to keep perceived delay low while tolerating
/// intra-phrase pauses. Natural sentence gaps are typically 500ms+.
pub const ENDPOINT_SILENCE_MS: u64 = 300;

/// Hard cap on utterance duration in milliseconds.
///
/// Bounds how much latency buffering alone can consume: a speaker who never
/// pauses still gets results every 15s.
pub const MAX_UTTERANCE_MS: u64 = 15_000;

/// Expected inbound audio frame duration in milliseconds.
pub const FRAME_MS: u64 = 100;

/// Audio sample rate in Hz. 16kHz mono PCM is the standard input for
/// speech recognition engines.
pub const SAMPLE_RATE: u32 = 16_000;

/// RMS threshold for the built-in energy voice-activity detector.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Seconds without frames before an idle session is ended automatically.
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 120;

/// Reordering window for delivery: a completed result may be delivered at
/// most this many sequence numbers ahead of an undelivered predecessor.
pub const REORDER_WINDOW: u64 = 2;

/// Transcription confidence below this is flagged as suspect but the
/// utterance still proceeds to translation.
pub const MIN_STT_CONFIDENCE: f32 = 0.4;

/// Weight of transcription confidence in overall quality.
pub const QUALITY_WEIGHT_STT: f32 = 0.3;

/// Weight of translation confidence in overall quality.
pub const QUALITY_WEIGHT_MT: f32 = 0.3;

/// Weight of synthesis quality in overall quality.
pub const QUALITY_WEIGHT_VOICE: f32 = 0.4;

/// Rolling quality window per session, in utterances.
pub const SESSION_QUALITY_WINDOW: usize = 100;

/// Rolling quality window across all sessions, in utterances.
pub const GLOBAL_QUALITY_WINDOW: usize = 1_000;

/// Language codes accepted at session creation.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko", "ar", "hi",
    "nl", "sv", "da", "no", "fi", "pl", "cs", "sk", "hu", "ro", "bg", "hr",
    "sl", "et", "lv", "lt", "mt", "tr",
];

/// Returns true if the language code is supported.
pub fn is_supported_language(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}
