//! Per-session delivery ordering gate.
//!
//! Utterances within a session may overlap, so results can complete out of
//! sequence. The gate buffers completed results until all lower sequence
//! numbers have been released, up to a bounded reordering window: a result
//! too far ahead of the gap is released out of order rather than stalling,
//! and a straggler superseded beyond the window is released as a dropped
//! marker rather than retried.

use crate::pipeline::types::{Delivery, DeliveryMode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Reorders completed deliveries by sequence number within a window.
pub struct DeliveryGate {
    window: u64,
    /// Lowest sequence number not yet released.
    next_expected: u64,
    /// Highest sequence number released so far.
    highest_released: Option<u64>,
    /// Completed results waiting for a lower sequence number.
    pending: BTreeMap<u64, Delivery>,
    /// Sequence numbers already force-released ahead of the gap.
    released_ahead: BTreeSet<u64>,
}

impl DeliveryGate {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            next_expected: 0,
            highest_released: None,
            pending: BTreeMap::new(),
            released_ahead: BTreeSet::new(),
        }
    }

    /// Number of completed results currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accepts one completed delivery and returns everything now releasable,
    /// in release order.
    pub fn submit(&mut self, delivery: Delivery) -> Vec<Delivery> {
        let mut released = Vec::new();
        let sequence = delivery.sequence_number;

        if sequence < self.next_expected {
            // Already released (or skipped as released-ahead): duplicate.
            warn!(sequence, "duplicate delivery discarded by ordering gate");
            return released;
        }

        if sequence == self.next_expected {
            self.release(delivery, &mut released);
            self.drain(&mut released);
        } else if sequence - self.next_expected > self.window {
            // Too far ahead of the gap to hold back.
            debug!(
                sequence,
                next_expected = self.next_expected,
                "releasing out of order past the reordering window"
            );
            self.released_ahead.insert(sequence);
            self.release(delivery, &mut released);
        } else {
            self.pending.insert(sequence, delivery);
        }

        released
    }

    fn drain(&mut self, released: &mut Vec<Delivery>) {
        loop {
            if self.released_ahead.remove(&self.next_expected) {
                self.next_expected += 1;
            } else if let Some(delivery) = self.pending.remove(&self.next_expected) {
                self.release(delivery, released);
            } else {
                break;
            }
        }
    }

    fn release(&mut self, mut delivery: Delivery, released: &mut Vec<Delivery>) {
        let sequence = delivery.sequence_number;

        // Superseded beyond the window: mark as a gap instead of replaying
        // stale content.
        let superseded = self
            .highest_released
            .is_some_and(|highest| highest.saturating_sub(sequence) > self.window);
        if superseded && delivery.delivery_mode != DeliveryMode::Dropped {
            warn!(sequence, "delivery superseded beyond reordering window, dropping");
            delivery.delivery_mode = DeliveryMode::Dropped;
            delivery.synthesized_audio = None;
        }

        self.highest_released = Some(self.highest_released.map_or(sequence, |h| h.max(sequence)));
        if sequence == self.next_expected {
            self.next_expected += 1;
        }
        released.push(delivery);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{PerformanceMetrics, QualityMetrics};

    fn delivery(sequence: u64) -> Delivery {
        Delivery {
            session_id: "session-1".to_string(),
            sequence_number: sequence,
            source_text: "hello".to_string(),
            translated_text: "hola".to_string(),
            synthesized_audio: Some(vec![0u8; 4]),
            quality: QualityMetrics {
                stt_confidence: 0.9,
                mt_confidence: 0.9,
                voice_quality: 0.9,
                overall_quality: 0.9,
            },
            performance: PerformanceMetrics {
                total_time_ms: 100,
                met_target: true,
            },
            delivery_mode: DeliveryMode::Full,
        }
    }

    fn sequences(released: &[Delivery]) -> Vec<u64> {
        released.iter().map(|d| d.sequence_number).collect()
    }

    #[test]
    fn in_order_results_pass_straight_through() {
        let mut gate = DeliveryGate::new(2);
        assert_eq!(sequences(&gate.submit(delivery(0))), vec![0]);
        assert_eq!(sequences(&gate.submit(delivery(1))), vec![1]);
        assert_eq!(sequences(&gate.submit(delivery(2))), vec![2]);
    }

    #[test]
    fn out_of_order_within_window_buffers_until_gap_fills() {
        let mut gate = DeliveryGate::new(2);
        assert!(gate.submit(delivery(1)).is_empty());
        assert!(gate.submit(delivery(2)).is_empty());
        assert_eq!(gate.pending_len(), 2);

        // The gap filler releases everything in order.
        assert_eq!(sequences(&gate.submit(delivery(0))), vec![0, 1, 2]);
        assert_eq!(gate.pending_len(), 0);
    }

    #[test]
    fn result_past_window_is_released_out_of_order() {
        let mut gate = DeliveryGate::new(2);
        // Sequence 3 is more than 2 ahead of the expected 0.
        assert_eq!(sequences(&gate.submit(delivery(3))), vec![3]);

        // The stragglers still release normally; 3 is not replayed.
        assert_eq!(sequences(&gate.submit(delivery(0))), vec![0]);
        assert_eq!(sequences(&gate.submit(delivery(1))), vec![1]);
        let released = gate.submit(delivery(2));
        assert_eq!(sequences(&released), vec![2]);
        assert_eq!(released[0].delivery_mode, DeliveryMode::Full);
    }

    #[test]
    fn straggler_superseded_beyond_window_is_marked_dropped() {
        let mut gate = DeliveryGate::new(2);
        assert_eq!(sequences(&gate.submit(delivery(4))), vec![4]);

        // Sequence 0 is more than 2 behind the already-released 4.
        let released = gate.submit(delivery(0));
        assert_eq!(sequences(&released), vec![0]);
        assert_eq!(released[0].delivery_mode, DeliveryMode::Dropped);
        assert!(released[0].synthesized_audio.is_none());

        // Sequence 1 is still more than 2 behind: dropped as well.
        let released = gate.submit(delivery(1));
        assert_eq!(released[0].delivery_mode, DeliveryMode::Dropped);

        // Sequence 2 is exactly at the window edge: released intact.
        let released = gate.submit(delivery(2));
        assert_eq!(released[0].delivery_mode, DeliveryMode::Full);
    }

    #[test]
    fn duplicate_sequence_is_discarded() {
        let mut gate = DeliveryGate::new(2);
        gate.submit(delivery(0));
        assert!(gate.submit(delivery(0)).is_empty());
    }

    #[test]
    fn released_sequences_are_non_decreasing_within_window() {
        // Shuffled completion order. Every submitted sequence is released
        // exactly once, and any release stepping back more than the window
        // behind the highest released sequence carries the dropped marker
        // instead of stale content.
        let mut gate = DeliveryGate::new(2);
        let mut released = Vec::new();
        for sequence in [2u64, 0, 5, 1, 3, 4, 7, 6] {
            released.extend(gate.submit(delivery(sequence)));
        }
        assert_eq!(released.len(), 8);

        let mut max_seen = 0u64;
        for delivery in &released {
            let sequence = delivery.sequence_number;
            if delivery.delivery_mode != DeliveryMode::Dropped {
                assert!(
                    sequence + 2 >= max_seen,
                    "sequence {sequence} released intact more than 2 behind {max_seen}"
                );
            }
            max_seen = max_seen.max(sequence);
        }
    }
}
