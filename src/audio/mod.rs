//! Audio capture and playback.

pub mod capture;
pub mod playback;

use crate::pipeline::messages::Frame;
use std::time::Instant;

/// Re-blocks arbitrarily sized device buffers into fixed-duration frames.
///
/// Device callbacks deliver whatever buffer size the driver chose; the
/// endpoint detector requires frames of exactly `frame_samples` samples.
/// Leftover samples stay pending until the next callback completes them.
/// The first `pre_roll_frames` completed frames are discarded unconditionally
/// (device warm-up skew) and never reach the caller.
#[derive(Debug)]
pub struct FrameChunker {
    frame_samples: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    pre_roll_remaining: usize,
}

impl FrameChunker {
    /// Create a chunker producing frames of `frame_samples` samples after
    /// discarding the first `pre_roll_frames` frames.
    #[must_use]
    pub fn new(frame_samples: usize, sample_rate: u32, pre_roll_frames: usize) -> Self {
        Self {
            frame_samples,
            sample_rate,
            pending: Vec::with_capacity(frame_samples),
            pre_roll_remaining: pre_roll_frames,
        }
    }

    /// Feed samples; returns every frame completed by this batch, minus any
    /// still covered by the pre-roll discard.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Frame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let full = std::mem::replace(&mut self.pending, rest);
            if self.pre_roll_remaining > 0 {
                self.pre_roll_remaining -= 1;
                continue;
            }
            frames.push(Frame {
                samples: full,
                sample_rate: self.sample_rate,
                captured_at: Instant::now(),
            });
        }
        frames
    }

    /// Samples waiting for the next frame boundary.
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}
