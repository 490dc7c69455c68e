//! End-to-end latency budget for one utterance.
//!
//! The per-stage shares are advisory; they only size the per-stage timeouts.
//! The remaining-budget check is the authoritative cutoff: a stage is never
//! started once the total budget is spent.

use crate::defaults;
use crate::engine::runner::Stage;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks elapsed time against the total budget from utterance creation.
#[derive(Debug, Clone, Copy)]
pub struct LatencyBudget {
    started_at: Instant,
    total: Duration,
    transcribe_share: f64,
    translate_share: f64,
    synthesize_share: f64,
}

impl LatencyBudget {
    /// Starts the clock at `started_at`, normally the utterance's creation.
    pub fn new(
        started_at: Instant,
        total_ms: u64,
        shares: (f64, f64, f64),
    ) -> Self {
        Self {
            started_at,
            total: Duration::from_millis(total_ms),
            transcribe_share: shares.0,
            translate_share: shares.1,
            synthesize_share: shares.2,
        }
    }

    /// Budget with the stock target and shares.
    pub fn standard(started_at: Instant) -> Self {
        Self::new(
            started_at,
            defaults::LATENCY_TARGET_MS,
            (
                defaults::TRANSCRIBE_BUDGET_SHARE,
                defaults::TRANSLATE_BUDGET_SHARE,
                defaults::SYNTHESIZE_BUDGET_SHARE,
            ),
        )
    }

    /// Soft per-stage timeout: the stage's share of the total budget.
    pub fn stage_timeout(&self, stage: Stage) -> Duration {
        let share = match stage {
            Stage::Transcribe => self.transcribe_share,
            Stage::Translate => self.translate_share,
            Stage::Synthesize => self.synthesize_share,
        };
        Duration::from_secs_f64(self.total.as_secs_f64() * share)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// True once the total budget is spent. Checked before each stage.
    pub fn exhausted(&self) -> bool {
        self.elapsed() >= self.total
    }

    pub fn target_ms(&self) -> u64 {
        self.total.as_millis() as u64
    }
}
