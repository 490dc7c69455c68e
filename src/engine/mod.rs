//! Pluggable stage engines and the uniform runner around them.
//!
//! The three stages — transcribe, translate, synthesize — are external
//! collaborators behind fixed trait contracts. The orchestrator never sees
//! a concrete engine, only `StageResult`s produced by `StageRunner`.

pub mod deterministic;
pub mod runner;
pub mod traits;

pub use deterministic::{DeterministicSynthesizer, DeterministicTranscriber, DeterministicTranslator};
pub use runner::{StageRunner, StageRunnerConfig};
pub use traits::{
    EngineError, EngineResult, EngineSet, Synthesis, Synthesizer, Transcriber, Transcription,
    Translation, Translator,
};
