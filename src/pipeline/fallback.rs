//! Degradation decision table.
//!
//! Consulted whenever a stage fails or the budget runs out. Preference
//! order on synthesis failure: translated text only, then passthrough of
//! the original audio, then an explicit dropped marker. Silent loss never
//! occurs.

use crate::pipeline::types::DeliveryMode;

/// Policy knobs for degraded deliveries.
#[derive(Debug, Clone, Copy)]
pub struct FallbackPolicy {
    /// On translation failure, substitute the source text and continue.
    pub passthrough_text: bool,
    /// Allow delivering the original utterance audio when no text exists.
    pub passthrough_audio: bool,
    /// Skip synthesis when translation already fell back to passthrough
    /// text; the delivery becomes passthrough audio instead.
    pub skip_synthesis_after_text_fallback: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            passthrough_text: true,
            passthrough_audio: true,
            skip_synthesis_after_text_fallback: false,
        }
    }
}

impl FallbackPolicy {
    /// Best delivery when transcription produced nothing.
    pub fn without_text(&self) -> DeliveryMode {
        if self.passthrough_audio {
            DeliveryMode::PassthroughAudio
        } else {
            DeliveryMode::Dropped
        }
    }

    /// Best delivery when text exists but synthesis failed or was skipped.
    pub fn without_audio(&self, has_text: bool) -> DeliveryMode {
        if has_text {
            DeliveryMode::TextOnly
        } else {
            self.without_text()
        }
    }
}
