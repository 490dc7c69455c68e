//! Per-utterance pipeline: budget, fallback, orchestration, ordering.

pub mod budget;
pub mod fallback;
pub mod normalize;
pub mod orchestrator;
pub mod reorder;
pub mod types;

pub use budget::LatencyBudget;
pub use fallback::FallbackPolicy;
pub use orchestrator::{OrchestratorConfig, PipelineOrchestrator};
pub use reorder::DeliveryGate;
pub use types::{
    Delivery, DeliveryMode, ModelLabels, PerformanceMetrics, QualityMetrics, SessionSnapshot,
    Utterance, UtteranceState,
};
