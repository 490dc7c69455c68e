//! Per-session audio buffering and utterance endpointing.
//!
//! Accumulates small inbound frames and emits utterance-sized spans when the
//! voice-activity signal reports enough trailing silence, or when the hard
//! duration cap is hit.

pub mod chunker;
pub mod frame;
pub mod vad;

pub use chunker::{UtteranceBuffer, UtteranceBufferConfig};
pub use frame::{AudioFrame, AudioSpan};
pub use vad::{EnergyVad, ScriptedVad, VoiceActivity};
