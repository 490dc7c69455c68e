//! Rolling quality and latency telemetry.
//!
//! A read-only observer of delivery outcomes: the aggregator folds each
//! sample into rolling per-session and global windows and answers stat
//! queries. Updates take a brief lock and never await, so recording cannot
//! stall a pipeline task.

use crate::config::QualitySettings;
use crate::defaults;
use crate::pipeline::types::Delivery;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Stage weights for the overall quality score.
#[derive(Debug, Clone, Copy)]
pub struct QualityWeights {
    pub stt: f32,
    pub mt: f32,
    pub voice: f32,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            stt: defaults::QUALITY_WEIGHT_STT,
            mt: defaults::QUALITY_WEIGHT_MT,
            voice: defaults::QUALITY_WEIGHT_VOICE,
        }
    }
}

impl QualityWeights {
    pub fn from_settings(settings: &QualitySettings) -> Self {
        Self {
            stt: settings.stt_weight,
            mt: settings.mt_weight,
            voice: settings.voice_weight,
        }
    }

    /// Weighted average of the three stage confidences.
    pub fn overall(&self, stt: f32, mt: f32, voice: f32) -> f32 {
        stt * self.stt + mt * self.mt + voice * self.voice
    }
}

/// One delivered utterance's quality figures. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySample {
    pub session_id: String,
    pub sequence: u64,
    pub stt_confidence: f32,
    pub mt_confidence: f32,
    pub voice_quality: f32,
    pub overall_quality: f32,
    pub total_time_ms: u64,
    pub met_target: bool,
}

impl QualitySample {
    pub fn from_delivery(delivery: &Delivery) -> Self {
        Self {
            session_id: delivery.session_id.clone(),
            sequence: delivery.sequence_number,
            stt_confidence: delivery.quality.stt_confidence,
            mt_confidence: delivery.quality.mt_confidence,
            voice_quality: delivery.quality.voice_quality,
            overall_quality: delivery.quality.overall_quality,
            total_time_ms: delivery.performance.total_time_ms,
            met_target: delivery.performance.met_target,
        }
    }
}

/// Aggregate statistics over one rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub utterances: usize,
    pub average_quality: f32,
    pub average_latency_ms: f64,
    pub p95_latency_ms: u64,
    pub target_met_rate: f64,
}

impl WindowStats {
    fn empty() -> Self {
        Self {
            utterances: 0,
            average_quality: 0.0,
            average_latency_ms: 0.0,
            p95_latency_ms: 0,
            target_met_rate: 0.0,
        }
    }
}

/// Compact window entry; strings are not retained per sample.
#[derive(Debug, Clone, Copy)]
struct Entry {
    overall_quality: f32,
    total_time_ms: u64,
    met_target: bool,
}

struct Window {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    fn push(&mut self, entry: Entry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn stats(&self) -> WindowStats {
        let n = self.entries.len();
        if n == 0 {
            return WindowStats::empty();
        }

        let mut quality_sum = 0.0f64;
        let mut latency_sum = 0u64;
        let mut met = 0usize;
        let mut latencies = Vec::with_capacity(n);
        for entry in &self.entries {
            quality_sum += f64::from(entry.overall_quality);
            latency_sum += entry.total_time_ms;
            met += usize::from(entry.met_target);
            latencies.push(entry.total_time_ms);
        }
        latencies.sort_unstable();

        // Nearest-rank 95th percentile.
        let rank = ((n as f64 * 0.95).ceil() as usize).clamp(1, n);

        WindowStats {
            utterances: n,
            average_quality: (quality_sum / n as f64) as f32,
            average_latency_ms: latency_sum as f64 / n as f64,
            p95_latency_ms: latencies[rank - 1],
            target_met_rate: met as f64 / n as f64,
        }
    }
}

struct AggregatorState {
    global: Window,
    sessions: HashMap<String, Window>,
}

/// Folds delivery samples into rolling windows and serves stat queries.
pub struct QualityAggregator {
    session_capacity: usize,
    state: Mutex<AggregatorState>,
}

impl QualityAggregator {
    pub fn new(settings: &QualitySettings) -> Self {
        Self {
            session_capacity: settings.session_window,
            state: Mutex::new(AggregatorState {
                global: Window::new(settings.global_window),
                sessions: HashMap::new(),
            }),
        }
    }

    /// Records one sample into the session's window and the global window.
    pub fn record(&self, sample: &QualitySample) {
        let entry = Entry {
            overall_quality: sample.overall_quality,
            total_time_ms: sample.total_time_ms,
            met_target: sample.met_target,
        };

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.global.push(entry);
        state
            .sessions
            .entry(sample.session_id.clone())
            .or_insert_with(|| Window::new(self.session_capacity))
            .push(entry);
    }

    /// Stats over the session's rolling window, if it has any samples.
    pub fn session_stats(&self, session_id: &str) -> Option<WindowStats> {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.sessions.get(session_id).map(Window::stats)
    }

    /// Stats over the global rolling window.
    pub fn global_stats(&self) -> WindowStats {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.global.stats()
    }

    /// Drops a session's window once the session ends. Its samples remain
    /// in the global window.
    pub fn forget_session(&self, session_id: &str) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.sessions.remove(session_id);
    }
}

impl Default for QualityAggregator {
    fn default() -> Self {
        Self::new(&QualitySettings::default())
    }
}
