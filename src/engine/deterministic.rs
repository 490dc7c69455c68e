//! Deterministic fallback engines.
//!
//! Offline stand-ins for the real model bindings, selected by configuration
//! (`EngineBinding::Deterministic`). They produce stable, length-derived
//! output so the pipeline can run end to end without any model deployment.

use crate::buffer::frame::AudioSpan;
use crate::engine::traits::{
    EngineError, EngineResult, Synthesis, Synthesizer, Transcriber, Transcription, Translation,
    Translator,
};
use async_trait::async_trait;

/// Transcriber that derives canned text from the span duration.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTranscriber;

#[async_trait]
impl Transcriber for DeterministicTranscriber {
    async fn transcribe(
        &self,
        audio: &AudioSpan,
        _source_language: &str,
    ) -> EngineResult<Transcription> {
        if audio.is_empty() {
            return Err(EngineError::validation("empty audio span"));
        }

        let text = match audio.duration_ms() {
            0..=1000 => "Hello",
            1001..=3000 => "Hello, how are you?",
            _ => "Hello, how are you? This is a longer passage of speech.",
        };

        Ok(Transcription {
            text: text.to_string(),
            confidence: 0.95,
        })
    }

    fn name(&self) -> &str {
        "deterministic-stt"
    }
}

/// Translator with a small phrase dictionary; everything else is passed
/// through tagged with the target language.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTranslator;

/// Fixed (source text, target language, translation) triples.
const PHRASES: &[(&str, &str, &str)] = &[
    ("Hello", "es", "Hola"),
    ("Hello", "fr", "Bonjour"),
    ("Hello", "de", "Hallo"),
    ("Hello, how are you?", "es", "Hola, ¿cómo estás?"),
    ("Hello, how are you?", "fr", "Bonjour, comment allez-vous?"),
    ("Hello, how are you?", "de", "Hallo, wie geht es dir?"),
    ("Thank you", "es", "Gracias"),
    ("Thank you", "fr", "Merci"),
    ("Goodbye", "es", "Adiós"),
    ("Goodbye", "fr", "Au revoir"),
];

#[async_trait]
impl Translator for DeterministicTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> EngineResult<Translation> {
        if text.trim().is_empty() {
            return Err(EngineError::validation("empty source text"));
        }

        if source_language == target_language {
            return Ok(Translation {
                text: text.to_string(),
                confidence: 1.0,
            });
        }

        let hit = PHRASES
            .iter()
            .find(|(src, lang, _)| *src == text && *lang == target_language);

        let (text, confidence) = match hit {
            Some((_, _, translated)) => ((*translated).to_string(), 0.9),
            None => (format!("[{target_language}] {text}"), 0.7),
        };

        Ok(Translation { text, confidence })
    }

    fn name(&self) -> &str {
        "deterministic-mt"
    }
}

/// Synthesizer that emits silence PCM sized to the text length.
#[derive(Debug, Clone)]
pub struct DeterministicSynthesizer {
    sample_rate: u32,
    /// Approximate speech rate used to size the output, chars per second.
    chars_per_second: u32,
}

impl Default for DeterministicSynthesizer {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            chars_per_second: 15,
        }
    }
}

#[async_trait]
impl Synthesizer for DeterministicSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _target_language: &str,
        voice_profile: &str,
    ) -> EngineResult<Synthesis> {
        if text.trim().is_empty() {
            return Err(EngineError::validation("empty synthesis text"));
        }
        if voice_profile.is_empty() {
            return Err(EngineError::validation("missing voice profile"));
        }

        let seconds = (text.chars().count() as f64 / self.chars_per_second as f64).max(0.2);
        let samples = (seconds * self.sample_rate as f64) as usize;
        Ok(Synthesis {
            audio: vec![0u8; samples * 2],
            confidence: 0.8,
        })
    }

    fn name(&self) -> &str {
        "deterministic-tts"
    }
}
