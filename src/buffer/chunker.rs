//! Utterance endpointing state machine.
//!
//! Drives timing off the frame timestamps supplied by the transport layer,
//! so endpointing is deterministic and independent of processing delays.

use crate::buffer::frame::{AudioFrame, AudioSpan};
use crate::buffer::vad::VoiceActivity;
use crate::defaults;
use std::sync::Arc;

/// Endpointing configuration.
#[derive(Debug, Clone, Copy)]
pub struct UtteranceBufferConfig {
    /// Trailing silence that closes the utterance, in milliseconds.
    pub endpoint_silence_ms: u64,
    /// Hard cap on utterance duration, in milliseconds.
    pub max_utterance_ms: u64,
    /// Sample rate of inbound frames.
    pub sample_rate: u32,
}

impl Default for UtteranceBufferConfig {
    fn default() -> Self {
        Self {
            endpoint_silence_ms: defaults::ENDPOINT_SILENCE_MS,
            max_utterance_ms: defaults::MAX_UTTERANCE_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Accumulates frames for one session and emits utterance spans.
///
/// Leading silence is discarded. Once speech starts, frames (including
/// intra-utterance silence) accumulate until either the silence gap reaches
/// `endpoint_silence_ms` or the span hits `max_utterance_ms`.
pub struct UtteranceBuffer {
    config: UtteranceBufferConfig,
    vad: Arc<dyn VoiceActivity>,
    bytes: Vec<u8>,
    start_ms: Option<u64>,
    last_speech_ms: u64,
    last_frame_end_ms: u64,
}

impl UtteranceBuffer {
    /// Creates a buffer with the given endpointing config and VAD binding.
    pub fn new(config: UtteranceBufferConfig, vad: Arc<dyn VoiceActivity>) -> Self {
        Self {
            config,
            vad,
            bytes: Vec::new(),
            start_ms: None,
            last_speech_ms: 0,
            last_frame_end_ms: 0,
        }
    }

    /// Returns true if no speech is currently buffered.
    pub fn is_idle(&self) -> bool {
        self.start_ms.is_none()
    }

    /// Ingests one frame. Returns a completed utterance span when a speech
    /// boundary is detected, None while buffering.
    pub fn push(&mut self, frame: AudioFrame) -> Option<AudioSpan> {
        let frame_end = frame.timestamp_ms + frame.duration_ms(self.config.sample_rate);
        let is_speech = self.vad.is_speech(&frame.bytes);

        match self.start_ms {
            None => {
                if !is_speech {
                    // Leading silence: discard.
                    return None;
                }
                self.start_ms = Some(frame.timestamp_ms);
                self.last_speech_ms = frame_end;
                self.last_frame_end_ms = frame_end;
                self.bytes.extend_from_slice(&frame.bytes);
                self.check_cap()
            }
            Some(_) => {
                self.bytes.extend_from_slice(&frame.bytes);
                self.last_frame_end_ms = frame_end;
                if is_speech {
                    self.last_speech_ms = frame_end;
                }

                let silence_gap = frame_end.saturating_sub(self.last_speech_ms);
                if silence_gap >= self.config.endpoint_silence_ms {
                    return Some(self.take_span());
                }

                self.check_cap()
            }
        }
    }

    fn check_cap(&mut self) -> Option<AudioSpan> {
        let start = self.start_ms?;
        if self.last_frame_end_ms.saturating_sub(start) >= self.config.max_utterance_ms {
            return Some(self.take_span());
        }
        None
    }

    fn take_span(&mut self) -> AudioSpan {
        let span = AudioSpan {
            bytes: std::mem::take(&mut self.bytes),
            start_ms: self.start_ms.take().unwrap_or(0),
            end_ms: self.last_frame_end_ms,
        };
        self.last_speech_ms = 0;
        span
    }

    /// Discards any partially buffered speech.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.start_ms = None;
        self.last_speech_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::vad::ScriptedVad;

    const FRAME_BYTES: usize = 3200; // 100ms at 16kHz, 16-bit mono

    fn frame(ts_ms: u64) -> AudioFrame {
        AudioFrame::new(vec![0u8; FRAME_BYTES], ts_ms)
    }

    fn buffer_with_script(script: Vec<bool>) -> UtteranceBuffer {
        UtteranceBuffer::new(
            UtteranceBufferConfig::default(),
            Arc::new(ScriptedVad::new(script)),
        )
    }

    #[test]
    fn leading_silence_is_discarded() {
        let mut buffer = buffer_with_script(vec![false, false]);
        assert!(buffer.push(frame(0)).is_none());
        assert!(buffer.push(frame(100)).is_none());
        assert!(buffer.is_idle());
    }

    #[test]
    fn silence_gap_closes_utterance() {
        // 5 speech frames then silence; 300ms gap = 3 silent frames
        let script = vec![true, true, true, true, true, false, false, false];
        let mut buffer = buffer_with_script(script);

        for i in 0..7 {
            assert!(buffer.push(frame(i * 100)).is_none(), "frame {i}");
        }
        // 8th frame: frame_end=800, last speech ended at 500 → 300ms gap
        let span = buffer.push(frame(700)).expect("span should close");
        assert_eq!(span.start_ms, 0);
        assert_eq!(span.end_ms, 800);
        assert_eq!(span.bytes.len(), 8 * FRAME_BYTES);
        assert!(buffer.is_idle());
    }

    #[test]
    fn short_pause_does_not_close_utterance() {
        // speech, 200ms pause, speech again
        let script = vec![true, false, false, true, true];
        let mut buffer = buffer_with_script(script);

        for i in 0..5 {
            assert!(buffer.push(frame(i * 100)).is_none(), "frame {i}");
        }
        assert!(!buffer.is_idle());
    }

    #[test]
    fn hard_cap_closes_long_utterance() {
        let config = UtteranceBufferConfig {
            max_utterance_ms: 1000,
            ..Default::default()
        };
        let mut buffer = UtteranceBuffer::new(config, Arc::new(ScriptedVad::always_speech()));

        let mut span = None;
        for i in 0..15 {
            if let Some(s) = buffer.push(frame(i * 100)) {
                span = Some((i, s));
                break;
            }
        }
        let (i, span) = span.expect("cap should close the span");
        // Frame 9 ends at 1000ms: exactly the cap
        assert_eq!(i, 9);
        assert_eq!(span.duration_ms(), 1000);
    }

    #[test]
    fn buffer_resets_after_emit() {
        let script = vec![
            true, false, false, false, // first utterance, closed by gap
            true, false, false, false, // second utterance
        ];
        let mut buffer = buffer_with_script(script);

        let mut spans = Vec::new();
        for i in 0..8 {
            if let Some(span) = buffer.push(frame(i * 100)) {
                spans.push(span);
            }
        }
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].start_ms, 0);
        assert_eq!(spans[1].start_ms, 400);
    }

    #[test]
    fn clear_discards_partial_speech() {
        let mut buffer = buffer_with_script(vec![true]);
        assert!(buffer.push(frame(0)).is_none());
        assert!(!buffer.is_idle());

        buffer.clear();
        assert!(buffer.is_idle());
    }

    #[test]
    fn timestamps_drive_endpointing_not_arrival_time() {
        // Frames arrive in a burst but carry spaced timestamps; the gap is
        // computed from timestamps alone.
        let script = vec![true, false];
        let mut buffer = buffer_with_script(script);

        assert!(buffer.push(frame(0)).is_none());
        // Next frame timestamped 500ms later: 100ms frame ends at 600,
        // speech ended at 100 → 500ms gap, well past 300ms
        let span = buffer.push(frame(500)).expect("gap closes span");
        assert_eq!(span.end_ms, 600);
    }
}
