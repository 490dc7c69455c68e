//! lingolink - streaming speech-to-speech translation pipeline
//!
//! Turns a continuous stream of small audio frames per session into
//! delivered translated results (text and synthesized audio), coordinating
//! three pluggable stages under a strict end-to-end latency budget.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod buffer;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod monitor;
pub mod pipeline;
pub mod quality;
pub mod session;

// Core entry point
pub use session::SessionManager;

// Engine contracts (bind your own with EngineBinding::External)
pub use engine::traits::{
    EngineSet, Synthesis, Synthesizer, Transcriber, Transcription, Translation, Translator,
};

// Outbound types
pub use pipeline::types::{
    Delivery, DeliveryMode, ModelLabels, PerformanceMetrics, QualityMetrics, SessionSnapshot,
};

// Error handling
pub use error::{LingolinkError, Result};

// Config
pub use config::{Config, EngineBinding};

// Observability
pub use monitor::MonitorSnapshot;
pub use quality::WindowStats;
