//! Rolling framerate estimation from a short window of frame-arrival
//! timestamps, ported from the fixed-memory sampling policy in the
//! original grabber: a fresh, actively-ticking stream is measured against
//! its own inter-frame deltas; a stream that just paused briefly is
//! rebased against wall-clock time; a stream that has gone quiet for more
//! than 5x its own frame interval is reported as stalled.

use std::time::{Duration, Instant};

use super::ring_buffer::RingBuffer;

/// Negative sentinel returned by [`FramerateEstimator::estimate`] when the
/// stream is stalled or there isn't enough data yet.
pub const STALLED: f64 = -1.0;

pub struct FramerateEstimator {
    samples: RingBuffer<Instant>,
}

impl FramerateEstimator {
    /// `memory` is the number of most-recent timestamps retained; the
    /// original grabber defaults this to 15.
    pub fn new(memory: usize) -> Self {
        Self {
            samples: RingBuffer::new(memory.max(2)),
        }
    }

    pub fn insert(&mut self, ts: Instant) {
        self.samples.append(ts);
    }

    /// Estimate frames-per-second following the 7-step policy: stalled
    /// sentinel with fewer than 2 samples, fresh-stream measurement against
    /// inter-frame deltas, wall-clock rebasing when the stream paused
    /// briefly, and a stalled sentinel once the gap exceeds 5x the
    /// inter-frame delta.
    pub fn estimate(&self) -> f64 {
        self.estimate_at(Instant::now())
    }

    /// Same as [`Self::estimate`] but with an explicit "now", for
    /// deterministic testing.
    pub fn estimate_at(&self, now: Instant) -> f64 {
        let used = self.samples.used();
        if used < 2 {
            return STALLED;
        }
        let oldest = *self.samples.oldest().unwrap();
        let newest = *self.samples.newest().unwrap();

        let delta_frames = newest.saturating_duration_since(oldest).as_secs_f64();
        if delta_frames <= 0.0 {
            // All samples landed at (effectively) the same instant.
            return STALLED;
        }

        let delta_now = now.saturating_duration_since(newest).as_secs_f64();

        if delta_now < delta_frames {
            // Fresh stream: the inter-frame window is authoritative.
            (used - 1) as f64 / delta_frames
        } else if delta_now > 5.0 * delta_frames {
            STALLED
        } else {
            // Paused briefly: rebase against wall-clock time.
            let delta_total = now.saturating_duration_since(oldest).as_secs_f64();
            if delta_total <= 0.0 {
                STALLED
            } else {
                used as f64 / delta_total
            }
        }
    }
}
