//! Streaming speech endpoint detection.
//!
//! Frames are classified speech/non-speech by RMS energy thresholding, and a
//! two-state triggered/hangover machine demarcates one utterance at a time
//! from the continuous frame stream. The hangover window tolerates brief
//! pauses inside a sentence while still ending the utterance promptly once
//! silence dominates the trailing context.

use crate::config::EndpointConfig;
use crate::pipeline::messages::Frame;
use crate::utterance::UtteranceBuffer;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Speech/non-speech classifier using RMS energy thresholding.
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    /// RMS threshold above which a frame counts as speech.
    threshold: f32,
}

impl EnergyClassifier {
    /// Create a classifier with the given RMS threshold.
    ///
    /// See [`EndpointConfig::energy_threshold`] for the sensitivity table.
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify one frame as speech (`true`) or non-speech (`false`).
    #[must_use]
    pub fn classify(&self, frame: &Frame) -> bool {
        compute_rms_energy(&frame.samples) > self.threshold
    }
}

/// Compute RMS energy of audio samples.
fn compute_rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Fixed-capacity sliding window of the most recent classifications.
///
/// Only consulted while the detector is triggered. Capacity is fixed for the
/// life of the detector; pushing at capacity evicts the oldest entry.
#[derive(Debug)]
pub struct HangoverWindow {
    slots: VecDeque<bool>,
    capacity: usize,
}

impl HangoverWindow {
    /// Create an empty window with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push one classification, evicting the oldest when at capacity.
    pub fn push(&mut self, is_speech: bool) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(is_speech);
    }

    /// Whether the window has reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Fraction of window *capacity* occupied by non-speech classifications.
    #[must_use]
    pub fn non_speech_ratio(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        let non_speech = self.slots.iter().filter(|s| !**s).count();
        non_speech as f32 / self.capacity as f32
    }

    /// Drop all entries, keeping the capacity.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Current occupancy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the window holds no classifications.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Detector state: waiting for speech, or actively recording an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    Idle,
    Triggered,
}

/// Streaming speech endpoint detector.
///
/// Consumes one [`Frame`] at a time. A speech frame while idle starts an
/// utterance; while triggered, every frame is buffered and its classification
/// enters the hangover window. The utterance ends on the first frame where
/// the window is full and its non-speech ratio strictly exceeds the
/// configured silence ratio. Utterances shorter than the minimum frame count
/// are discarded as noise — the caller sees nothing, not a failure.
///
/// There is no terminal state: after each utterance the detector returns to
/// idle and is reused for the life of the session.
pub struct EndpointDetector {
    classifier: EnergyClassifier,
    window: HangoverWindow,
    buffer: UtteranceBuffer,
    state: DetectorState,
    silence_ratio: f32,
    min_utterance_frames: usize,
}

impl EndpointDetector {
    /// Create a detector from endpoint configuration.
    #[must_use]
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            classifier: EnergyClassifier::new(config.energy_threshold),
            window: HangoverWindow::new(config.hangover_window_frames),
            buffer: UtteranceBuffer::new(),
            state: DetectorState::Idle,
            silence_ratio: config.silence_ratio,
            min_utterance_frames: config.min_utterance_frames,
        }
    }

    /// Feed one frame; returns the completed utterance when speech ends.
    ///
    /// Returns `None` for every frame that does not complete an utterance,
    /// including end-of-speech on a below-minimum-length detection (treated
    /// as noise and dropped).
    pub fn push_frame(&mut self, frame: Frame) -> Option<UtteranceBuffer> {
        let is_speech = self.classifier.classify(&frame);

        match self.state {
            DetectorState::Idle => {
                if !is_speech {
                    // Non-speech while idle: frame discarded, nothing buffered.
                    return None;
                }
                self.state = DetectorState::Triggered;
                self.buffer.clear();
                self.window.clear();
                info!("speech started");
                self.buffer.push(frame);
                self.window.push(true);
                None
            }
            DetectorState::Triggered => {
                self.buffer.push(frame);
                self.window.push(is_speech);

                if self.window.is_full() && self.window.non_speech_ratio() > self.silence_ratio {
                    self.state = DetectorState::Idle;
                    self.window.clear();
                    let utterance = std::mem::take(&mut self.buffer);

                    if utterance.len() < self.min_utterance_frames {
                        debug!(
                            frames = utterance.len(),
                            min = self.min_utterance_frames,
                            "discarding short utterance as noise"
                        );
                        return None;
                    }

                    info!(frames = utterance.len(), "speech ended");
                    return Some(utterance);
                }
                None
            }
        }
    }

    /// Whether the detector is currently recording an utterance.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.state == DetectorState::Triggered
    }

    /// Number of frames buffered for the in-progress utterance.
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    /// Reset to idle, dropping any partial utterance.
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.buffer.clear();
        self.window.clear();
    }
}
