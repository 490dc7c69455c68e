//! Sequences the three stages for one utterance under the latency budget.

use crate::config::Config;
use crate::engine::runner::{Stage, StagePayload, StageRunner};
use crate::engine::traits::EngineSet;
use crate::pipeline::budget::LatencyBudget;
use crate::pipeline::fallback::FallbackPolicy;
use crate::pipeline::normalize::optimize_for_speech;
use crate::pipeline::types::{
    Delivery, DeliveryMode, PerformanceMetrics, QualityMetrics, SessionSnapshot, Utterance,
    UtteranceState,
};
use crate::quality::QualityWeights;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-deployment orchestration parameters.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub latency_target_ms: u64,
    /// Soft budget shares for transcribe/translate/synthesize.
    pub budget_shares: (f64, f64, f64),
    /// Transcriptions below this confidence are flagged, not failed.
    pub min_stt_confidence: f32,
    pub fallback: FallbackPolicy,
    pub quality_weights: QualityWeights,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            latency_target_ms: config.pipeline.latency_target_ms,
            budget_shares: (
                config.pipeline.transcribe_share,
                config.pipeline.translate_share,
                config.pipeline.synthesize_share,
            ),
            min_stt_confidence: config.pipeline.min_stt_confidence,
            fallback: FallbackPolicy::default(),
            quality_weights: QualityWeights::from_settings(&config.quality),
        }
    }
}

/// Runs one utterance through transcribe, translate, synthesize.
///
/// Stage failures never escape: every admitted utterance yields exactly one
/// `Delivery`, degraded per `FallbackPolicy` when needed. Before each stage
/// the remaining-budget check is consulted; once the total budget is spent,
/// the best fallback available at that point is delivered instead.
pub struct PipelineOrchestrator {
    engines: EngineSet,
    config: OrchestratorConfig,
}

impl PipelineOrchestrator {
    pub fn new(engines: EngineSet, config: OrchestratorConfig) -> Self {
        Self { engines, config }
    }

    pub async fn run(&self, mut utterance: Utterance, snapshot: &SessionSnapshot) -> Delivery {
        let budget = LatencyBudget::new(
            utterance.created_at,
            self.config.latency_target_ms,
            self.config.budget_shares,
        );

        let mut stt_confidence = 0.0f32;
        let mut mt_confidence = 0.0f32;
        let mut voice_quality = 0.0f32;
        let mut source_text = String::new();
        let mut translated_text = String::new();
        let mut synthesized: Option<Vec<u8>> = None;
        let mut text_fell_back = false;

        let original_audio = Arc::new(utterance.audio.clone());

        let mode = 'pipeline: {
            // Transcribe
            if budget.exhausted() {
                warn!(
                    session_id = %utterance.session_id,
                    sequence = utterance.sequence,
                    "budget exhausted before transcription"
                );
                break 'pipeline self.config.fallback.without_text();
            }
            utterance.advance(UtteranceState::Transcribing);

            let runner = StageRunner::new(Stage::Transcribe, budget.stage_timeout(Stage::Transcribe));
            let transcriber = Arc::clone(&self.engines.transcriber);
            let span = Arc::clone(&original_audio);
            let source_language = snapshot.source_language.clone();
            let result = runner
                .invoke(move || {
                    let transcriber = Arc::clone(&transcriber);
                    let span = Arc::clone(&span);
                    let language = source_language.clone();
                    async move {
                        let out = transcriber.transcribe(&span, &language).await?;
                        Ok((StagePayload::Text(out.text), out.confidence))
                    }
                })
                .await;

            match result.payload.as_ref().and_then(StagePayload::as_text) {
                Some(text) if result.succeeded => {
                    source_text = text.to_string();
                    stt_confidence = result.confidence;
                    if stt_confidence < self.config.min_stt_confidence {
                        warn!(
                            session_id = %utterance.session_id,
                            sequence = utterance.sequence,
                            confidence = stt_confidence,
                            "transcription below confidence floor, continuing"
                        );
                    }
                }
                _ => break 'pipeline self.config.fallback.without_text(),
            }

            // Translate
            if budget.exhausted() {
                if self.config.fallback.passthrough_text {
                    translated_text = source_text.clone();
                    break 'pipeline DeliveryMode::TextOnly;
                }
                break 'pipeline self.config.fallback.without_text();
            }
            utterance.advance(UtteranceState::Translating);

            let runner = StageRunner::new(Stage::Translate, budget.stage_timeout(Stage::Translate));
            let translator = Arc::clone(&self.engines.translator);
            let text = source_text.clone();
            let source_language = snapshot.source_language.clone();
            let target_language = snapshot.target_language.clone();
            let result = runner
                .invoke(move || {
                    let translator = Arc::clone(&translator);
                    let text = text.clone();
                    let source = source_language.clone();
                    let target = target_language.clone();
                    async move {
                        let out = translator.translate(&text, &source, &target).await?;
                        Ok((StagePayload::Text(out.text), out.confidence))
                    }
                })
                .await;

            match result.payload.as_ref().and_then(StagePayload::as_text) {
                Some(text) if result.succeeded => {
                    translated_text = text.to_string();
                    mt_confidence = result.confidence;
                }
                _ if self.config.fallback.passthrough_text => {
                    debug!(
                        session_id = %utterance.session_id,
                        sequence = utterance.sequence,
                        "translation failed, passing source text through"
                    );
                    translated_text = source_text.clone();
                    text_fell_back = true;
                }
                _ => break 'pipeline self.config.fallback.without_text(),
            }

            // Synthesize
            if text_fell_back && self.config.fallback.skip_synthesis_after_text_fallback {
                break 'pipeline DeliveryMode::PassthroughAudio;
            }
            if budget.exhausted() {
                break 'pipeline self.config.fallback.without_audio(true);
            }
            utterance.advance(UtteranceState::Synthesizing);

            let runner = StageRunner::new(Stage::Synthesize, budget.stage_timeout(Stage::Synthesize));
            let synthesizer = Arc::clone(&self.engines.synthesizer);
            let speech_text = optimize_for_speech(&translated_text);
            let target_language = snapshot.target_language.clone();
            let voice_profile = snapshot.voice_profile.clone();
            let result = runner
                .invoke(move || {
                    let synthesizer = Arc::clone(&synthesizer);
                    let text = speech_text.clone();
                    let target = target_language.clone();
                    let profile = voice_profile.clone();
                    async move {
                        let out = synthesizer.synthesize(&text, &target, &profile).await?;
                        Ok((StagePayload::Audio(out.audio), out.confidence))
                    }
                })
                .await;

            match result.payload {
                Some(StagePayload::Audio(audio)) if result.succeeded => {
                    synthesized = Some(audio);
                    voice_quality = result.confidence;
                    DeliveryMode::Full
                }
                _ => self.config.fallback.without_audio(true),
            }
        };

        if mode == DeliveryMode::PassthroughAudio {
            synthesized = Some(original_audio.bytes.clone());
        }

        utterance.advance(match mode {
            DeliveryMode::Dropped => UtteranceState::Failed,
            _ => UtteranceState::Delivered,
        });

        let total_time_ms = budget.elapsed_ms();
        let met_target = mode != DeliveryMode::Dropped && total_time_ms < budget.target_ms();
        let overall_quality =
            self.config
                .quality_weights
                .overall(stt_confidence, mt_confidence, voice_quality);

        info!(
            session_id = %utterance.session_id,
            sequence = utterance.sequence,
            ?mode,
            total_time_ms,
            overall_quality,
            "utterance resolved"
        );

        Delivery {
            session_id: utterance.session_id.clone(),
            sequence_number: utterance.sequence,
            source_text,
            translated_text,
            synthesized_audio: synthesized,
            quality: QualityMetrics {
                stt_confidence,
                mt_confidence,
                voice_quality,
                overall_quality,
            },
            performance: PerformanceMetrics {
                total_time_ms,
                met_target,
            },
            delivery_mode: mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::frame::AudioSpan;
    use crate::engine::traits::{EngineError, MockSynthesizer, MockTranscriber, MockTranslator};
    use std::time::Duration;

    fn utterance(duration_ms: u64) -> Utterance {
        Utterance::new(
            "session-1",
            0,
            AudioSpan {
                bytes: vec![0u8; (duration_ms as usize / 100) * 3200],
                start_ms: 0,
                end_ms: duration_ms,
            },
        )
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            voice_profile: "profile-1".to_string(),
            models: crate::pipeline::types::ModelLabels {
                transcriber: "whisper-large-v3".to_string(),
                translator: "nmt-base-v1".to_string(),
                synthesizer: "voice-clone-v2.1".to_string(),
            },
        }
    }

    #[allow(clippy::type_complexity)]
    fn engines(
        stt: MockTranscriber,
        mt: MockTranslator,
        tts: MockSynthesizer,
    ) -> (
        EngineSet,
        Arc<MockTranscriber>,
        Arc<MockTranslator>,
        Arc<MockSynthesizer>,
    ) {
        let stt = Arc::new(stt);
        let mt = Arc::new(mt);
        let tts = Arc::new(tts);
        let set = EngineSet {
            transcriber: stt.clone(),
            translator: mt.clone(),
            synthesizer: tts.clone(),
        };
        (set, stt, mt, tts)
    }

    fn orchestrator(set: EngineSet) -> PipelineOrchestrator {
        PipelineOrchestrator::new(set, OrchestratorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn full_success_within_budget() {
        let (set, ..) = engines(
            MockTranscriber::new()
                .with_response("hello")
                .with_confidence(0.9)
                .with_delay(Duration::from_millis(50)),
            MockTranslator::new()
                .with_response("hola")
                .with_confidence(0.8)
                .with_delay(Duration::from_millis(50)),
            MockSynthesizer::new()
                .with_confidence(0.7)
                .with_delay(Duration::from_millis(50)),
        );

        let delivery = orchestrator(set).run(utterance(1200), &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::Full);
        assert_eq!(delivery.source_text, "hello");
        assert_eq!(delivery.translated_text, "hola");
        assert!(delivery.synthesized_audio.is_some());
        assert!(delivery.performance.met_target);
        assert!(delivery.performance.total_time_ms < 400);
    }

    #[tokio::test(start_paused = true)]
    async fn overall_quality_is_the_weighted_average() {
        let (set, ..) = engines(
            MockTranscriber::new().with_confidence(0.9),
            MockTranslator::new().with_confidence(0.8),
            MockSynthesizer::new().with_confidence(0.6),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;

        let expected = 0.9 * 0.3 + 0.8 * 0.3 + 0.6 * 0.4;
        assert!((delivery.quality.overall_quality - expected).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn total_time_tracks_the_clock() {
        let (set, ..) = engines(
            MockTranscriber::new().with_delay(Duration::from_millis(50)),
            MockTranslator::new().with_delay(Duration::from_millis(40)),
            MockSynthesizer::new().with_delay(Duration::from_millis(30)),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;
        assert_eq!(delivery.performance.total_time_ms, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn low_stt_confidence_is_flagged_not_fatal() {
        let (set, _, mt, _) = engines(
            MockTranscriber::new().with_confidence(0.2),
            MockTranslator::new(),
            MockSynthesizer::new(),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;
        assert_eq!(delivery.delivery_mode, DeliveryMode::Full);
        assert_eq!(mt.invocation_count(), 1);
        assert_eq!(delivery.quality.stt_confidence, 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn transcriber_failure_falls_back_to_passthrough_audio() {
        let (set, _, mt, tts) = engines(
            MockTranscriber::new().with_failure(EngineError::validation("unreadable")),
            MockTranslator::new(),
            MockSynthesizer::new(),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::PassthroughAudio);
        // Original audio is passed through: 5 frames of 3200 bytes.
        assert_eq!(delivery.synthesized_audio.as_deref().map(<[u8]>::len), Some(16_000));
        assert_eq!(mt.invocation_count(), 0);
        assert_eq!(tts.invocation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn translator_failure_synthesizes_passthrough_source_text() {
        let (set, _, _, tts) = engines(
            MockTranscriber::new().with_response("hello"),
            MockTranslator::new().with_failure(EngineError::validation("no model")),
            MockSynthesizer::new(),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::Full);
        assert_eq!(delivery.translated_text, "hello");
        assert_eq!(delivery.quality.mt_confidence, 0.0);
        // Synthesis ran on the speech-normalized passthrough text.
        assert_eq!(tts.last_input().as_deref(), Some("hello."));
    }

    #[tokio::test(start_paused = true)]
    async fn translator_failure_with_synthesis_skip_is_passthrough_audio() {
        let (set, _, _, tts) = engines(
            MockTranscriber::new().with_response("hello"),
            MockTranslator::new().with_failure(EngineError::validation("no model")),
            MockSynthesizer::new(),
        );
        let config = OrchestratorConfig {
            fallback: FallbackPolicy {
                skip_synthesis_after_text_fallback: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let delivery = PipelineOrchestrator::new(set, config)
            .run(utterance(500), &snapshot())
            .await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::PassthroughAudio);
        assert_eq!(tts.invocation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesizer_timeout_degrades_to_text_only() {
        // Synthesize share of a 400ms budget is 200ms; 10s blows it.
        let (set, ..) = engines(
            MockTranscriber::new().with_response("hello"),
            MockTranslator::new().with_response("hola"),
            MockSynthesizer::new().with_delay(Duration::from_secs(10)),
        );

        let delivery = orchestrator(set).run(utterance(500), &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::TextOnly);
        assert_eq!(delivery.translated_text, "hola");
        assert!(delivery.synthesized_audio.is_none());
        assert_eq!(delivery.quality.voice_quality, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_skips_all_stages() {
        let (set, stt, mt, tts) = engines(
            MockTranscriber::new(),
            MockTranslator::new(),
            MockSynthesizer::new(),
        );
        let orchestrator = orchestrator(set);

        let utterance = utterance(500);
        tokio::time::advance(Duration::from_millis(400)).await;

        let delivery = orchestrator.run(utterance, &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::PassthroughAudio);
        assert_eq!(stt.invocation_count(), 0);
        assert_eq!(mt.invocation_count(), 0);
        assert_eq!(tts.invocation_count(), 0);
        assert!(!delivery.performance.met_target);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhausted_after_translation_delivers_text_only() {
        // Transcribe (100ms) and translate (50ms) fit their shares, but a
        // slow translate attempt pushes the total past 400ms.
        let (set, _, _, tts) = engines(
            MockTranscriber::new().with_response("hello"),
            MockTranslator::new()
                .with_response("hola")
                .with_delay(Duration::from_millis(55)),
            MockSynthesizer::new(),
        );
        let orchestrator = orchestrator(set);

        let utterance = utterance(500);
        tokio::time::advance(Duration::from_millis(350)).await;

        let delivery = orchestrator.run(utterance, &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::TextOnly);
        assert_eq!(delivery.translated_text, "hola");
        assert_eq!(tts.invocation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deterministic_engines_run_end_to_end() {
        let orchestrator =
            PipelineOrchestrator::new(EngineSet::deterministic(), OrchestratorConfig::default());

        let delivery = orchestrator.run(utterance(500), &snapshot()).await;

        assert_eq!(delivery.delivery_mode, DeliveryMode::Full);
        assert_eq!(delivery.source_text, "Hello");
        assert_eq!(delivery.translated_text, "Hola");
        assert!(delivery.synthesized_audio.is_some());
        assert!(delivery.quality.overall_quality > 0.8);
    }
}
