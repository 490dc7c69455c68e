//! Voice-activity signal for utterance endpointing.
//!
//! The detector itself is an external collaborator; the buffer only consumes
//! its per-frame speech/silence verdict. `EnergyVad` is the built-in binding,
//! `ScriptedVad` drives deterministic tests.

use crate::defaults;

/// Per-frame voice-activity verdict.
///
/// Implementations must be cheap: they are called once per inbound frame.
pub trait VoiceActivity: Send + Sync {
    /// Returns true if the frame contains speech.
    fn is_speech(&self, frame_bytes: &[u8]) -> bool;
}

/// RMS-threshold voice-activity detector over 16-bit PCM.
#[derive(Debug, Clone, Copy)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    /// Creates a detector with the given RMS threshold (0.0 to 1.0).
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(defaults::VAD_THRESHOLD)
    }
}

impl VoiceActivity for EnergyVad {
    fn is_speech(&self, frame_bytes: &[u8]) -> bool {
        calculate_rms(frame_bytes) > self.threshold
    }
}

/// Normalized RMS energy of a 16-bit little-endian PCM buffer.
fn calculate_rms(bytes: &[u8]) -> f32 {
    if bytes.len() < 2 {
        return 0.0;
    }

    let mut sum_squares = 0.0f64;
    let mut count = 0usize;
    for pair in bytes.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / i16::MAX as f64;
        sum_squares += sample * sample;
        count += 1;
    }

    (sum_squares / count as f64).sqrt() as f32
}

/// Scripted detector for tests: answers from a fixed sequence, then repeats
/// the last answer.
pub struct ScriptedVad {
    script: Vec<bool>,
    position: std::sync::atomic::AtomicUsize,
}

impl ScriptedVad {
    /// Creates a detector that replays the given speech/silence sequence.
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script,
            position: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A detector that always reports speech.
    pub fn always_speech() -> Self {
        Self::new(vec![true])
    }

    /// A detector that always reports silence.
    pub fn always_silence() -> Self {
        Self::new(vec![false])
    }
}

impl VoiceActivity for ScriptedVad {
    fn is_speech(&self, _frame_bytes: &[u8]) -> bool {
        let index = self
            .position
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.script
            .get(index)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(false)
    }
}
