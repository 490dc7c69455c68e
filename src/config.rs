use crate::defaults;
use crate::error::{LingolinkError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSettings,
    pub buffer: BufferSettings,
    pub limiter: LimiterSettings,
    pub session: SessionSettings,
    pub quality: QualitySettings,
    pub engines: EngineSettings,
}

/// Latency budget and confidence settings for the utterance pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Total end-to-end budget per utterance in milliseconds.
    pub latency_target_ms: u64,
    /// Soft budget shares per stage. Advisory: they size per-stage timeouts,
    /// but the remaining-budget check is the authoritative cutoff.
    pub transcribe_share: f64,
    pub translate_share: f64,
    pub synthesize_share: f64,
    /// Transcriptions below this confidence are flagged but still translated.
    pub min_stt_confidence: f32,
    /// Delivery reordering window in sequence numbers.
    pub reorder_window: u64,
}

/// Utterance endpointing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferSettings {
    /// Silence duration that closes an utterance, in milliseconds.
    pub endpoint_silence_ms: u64,
    /// Hard cap on utterance duration, in milliseconds.
    pub max_utterance_ms: u64,
    /// RMS threshold for the built-in energy VAD.
    pub vad_threshold: f32,
    /// Sample rate of inbound PCM frames.
    pub sample_rate: u32,
}

/// Concurrency limiter settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimiterSettings {
    /// Maximum in-flight utterance pipelines across all sessions.
    pub max_concurrent_streams: usize,
    /// Queue depth for utterances waiting on a slot. None = 2x the limit.
    pub queue_depth: Option<usize>,
    /// Grace period a queued utterance waits before capacity rejection.
    pub queue_grace_ms: u64,
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds without inbound frames before a session auto-ends.
    pub idle_timeout_secs: u64,
}

/// Quality aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualitySettings {
    pub stt_weight: f32,
    pub mt_weight: f32,
    pub voice_weight: f32,
    /// Rolling window per session, in utterances.
    pub session_window: usize,
    /// Rolling window across all sessions, in utterances.
    pub global_window: usize,
}

/// Engine binding and model pinning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// How the three stage engines are bound at startup.
    pub binding: EngineBinding,
    /// Model version labels, captured immutably per session at creation.
    pub transcriber_model: String,
    pub translator_model: String,
    pub synthesizer_model: String,
}

/// Engine binding selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EngineBinding {
    /// Built-in deterministic engines: canned transcription, dictionary
    /// translation, silence synthesis. For offline use and testing.
    Deterministic,
    /// Engines are injected by the embedding application.
    External,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            latency_target_ms: defaults::LATENCY_TARGET_MS,
            transcribe_share: defaults::TRANSCRIBE_BUDGET_SHARE,
            translate_share: defaults::TRANSLATE_BUDGET_SHARE,
            synthesize_share: defaults::SYNTHESIZE_BUDGET_SHARE,
            min_stt_confidence: defaults::MIN_STT_CONFIDENCE,
            reorder_window: defaults::REORDER_WINDOW,
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            endpoint_silence_ms: defaults::ENDPOINT_SILENCE_MS,
            max_utterance_ms: defaults::MAX_UTTERANCE_MS,
            vad_threshold: defaults::VAD_THRESHOLD,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            max_concurrent_streams: defaults::MAX_CONCURRENT_STREAMS,
            queue_depth: None,
            queue_grace_ms: defaults::QUEUE_GRACE_MS,
        }
    }
}

impl LimiterSettings {
    /// Effective queue depth: explicit value or 2x the stream limit.
    pub fn effective_queue_depth(&self) -> usize {
        self.queue_depth
            .unwrap_or(self.max_concurrent_streams * defaults::QUEUE_DEPTH_FACTOR)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: defaults::SESSION_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            stt_weight: defaults::QUALITY_WEIGHT_STT,
            mt_weight: defaults::QUALITY_WEIGHT_MT,
            voice_weight: defaults::QUALITY_WEIGHT_VOICE,
            session_window: defaults::SESSION_QUALITY_WINDOW,
            global_window: defaults::GLOBAL_QUALITY_WINDOW,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binding: EngineBinding::Deterministic,
            transcriber_model: "whisper-large-v3".to_string(),
            translator_model: "nmt-base-v1".to_string(),
            synthesizer_model: "voice-clone-v2.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LingolinkError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                LingolinkError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't exist
    ///
    /// Invalid TOML or invalid values still produce an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(LingolinkError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LINGOLINK_LATENCY_TARGET_MS → pipeline.latency_target_ms
    /// - LINGOLINK_MAX_CONCURRENT_STREAMS → limiter.max_concurrent_streams
    /// - LINGOLINK_IDLE_TIMEOUT_SECS → session.idle_timeout_secs
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("LINGOLINK_LATENCY_TARGET_MS")
            && let Ok(ms) = value.parse::<u64>()
        {
            self.pipeline.latency_target_ms = ms;
        }

        if let Ok(value) = std::env::var("LINGOLINK_MAX_CONCURRENT_STREAMS")
            && let Ok(n) = value.parse::<usize>()
        {
            self.limiter.max_concurrent_streams = n;
        }

        if let Ok(value) = std::env::var("LINGOLINK_IDLE_TIMEOUT_SECS")
            && let Ok(secs) = value.parse::<u64>()
        {
            self.session.idle_timeout_secs = secs;
        }

        self
    }

    /// Validate value ranges. Called by `load`; call directly after
    /// constructing a config programmatically.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.latency_target_ms == 0 {
            return Err(LingolinkError::ConfigInvalidValue {
                key: "pipeline.latency_target_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let shares = self.pipeline.transcribe_share
            + self.pipeline.translate_share
            + self.pipeline.synthesize_share;
        if (shares - 1.0).abs() > 0.01 {
            return Err(LingolinkError::ConfigInvalidValue {
                key: "pipeline.*_share".to_string(),
                message: format!("stage shares must sum to 1.0, got {shares}"),
            });
        }

        if self.limiter.max_concurrent_streams == 0 {
            return Err(LingolinkError::ConfigInvalidValue {
                key: "limiter.max_concurrent_streams".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let weights = self.quality.stt_weight + self.quality.mt_weight + self.quality.voice_weight;
        if (weights - 1.0).abs() > 0.01 {
            return Err(LingolinkError::ConfigInvalidValue {
                key: "quality.*_weight".to_string(),
                message: format!("quality weights must sum to 1.0, got {weights}"),
            });
        }

        if self.buffer.endpoint_silence_ms == 0
            || self.buffer.max_utterance_ms <= self.buffer.endpoint_silence_ms
        {
            return Err(LingolinkError::ConfigInvalidValue {
                key: "buffer.max_utterance_ms".to_string(),
                message: "must exceed endpoint_silence_ms".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.latency_target_ms, 400);
        assert_eq!(config.limiter.max_concurrent_streams, 100);
        assert_eq!(config.buffer.endpoint_silence_ms, 300);
        assert_eq!(config.session.idle_timeout_secs, 120);
        assert_eq!(config.engines.binding, EngineBinding::Deterministic);
    }

    #[test]
    fn effective_queue_depth_defaults_to_double_limit() {
        let limiter = LimiterSettings::default();
        assert_eq!(limiter.effective_queue_depth(), 200);

        let limiter = LimiterSettings {
            max_concurrent_streams: 10,
            queue_depth: Some(5),
            ..Default::default()
        };
        assert_eq!(limiter.effective_queue_depth(), 5);
    }

    #[test]
    fn load_parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
latency_target_ms = 600

[limiter]
max_concurrent_streams = 4
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pipeline.latency_target_ms, 600);
        assert_eq!(config.limiter.max_concurrent_streams, 4);
        // Unset sections use defaults
        assert_eq!(config.buffer.endpoint_silence_ms, 300);
    }

    #[test]
    fn load_missing_file_is_config_file_not_found() {
        let result = Config::load(Path::new("/nonexistent/lingolink.toml"));
        assert!(matches!(
            result,
            Err(LingolinkError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn load_or_default_returns_defaults_for_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/lingolink.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_or_default_propagates_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not = valid = toml").unwrap();
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let config = Config {
            pipeline: PipelineSettings {
                latency_target_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LingolinkError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_shares() {
        let config = Config {
            pipeline: PipelineSettings {
                transcribe_share: 0.9,
                translate_share: 0.9,
                synthesize_share: 0.9,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_cap_below_silence_threshold() {
        let config = Config {
            buffer: BufferSettings {
                endpoint_silence_ms: 500,
                max_utterance_ms: 400,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_binding_round_trips_through_toml() {
        let toml_str = r#"
[engines]
binding = "deterministic"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engines.binding, EngineBinding::Deterministic);

        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("deterministic"));
    }
}
