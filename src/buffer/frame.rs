//! Frame and span types that flow into the pipeline.

/// One inbound audio frame (~100ms of PCM) with its capture timestamp.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio bytes (16-bit little-endian PCM, mono).
    pub bytes: Vec<u8>,
    /// Capture timestamp in milliseconds, assigned by the transport layer.
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(bytes: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            bytes,
            timestamp_ms,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u64 {
        let samples = (self.bytes.len() / 2) as u64;
        samples * 1000 / sample_rate as u64
    }
}

/// A bounded span of speech assembled from consecutive frames.
///
/// Spans are what the pipeline operates on: one span, one utterance.
#[derive(Debug, Clone)]
pub struct AudioSpan {
    /// Concatenated audio bytes of all frames in the span.
    pub bytes: Vec<u8>,
    /// Timestamp of the first speech frame, in milliseconds.
    pub start_ms: u64,
    /// Timestamp of the last frame included, in milliseconds.
    pub end_ms: u64,
}

impl AudioSpan {
    /// Returns the span duration in milliseconds based on frame timestamps.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Returns true if the span contains no audio.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_from_byte_length() {
        // 3200 bytes = 1600 samples = 100ms at 16kHz
        let frame = AudioFrame::new(vec![0u8; 3200], 0);
        assert_eq!(frame.duration_ms(16_000), 100);
    }

    #[test]
    fn span_duration_from_timestamps() {
        let span = AudioSpan {
            bytes: vec![0u8; 100],
            start_ms: 1000,
            end_ms: 2200,
        };
        assert_eq!(span.duration_ms(), 1200);
        assert!(!span.is_empty());
    }

    #[test]
    fn span_duration_saturates_on_clock_skew() {
        let span = AudioSpan {
            bytes: vec![],
            start_ms: 500,
            end_ms: 100,
        };
        assert_eq!(span.duration_ms(), 0);
        assert!(span.is_empty());
    }
}
