//! Utterance accumulation and the finalized audio artifact.
//!
//! Frames collected between trigger and end-of-speech are pure accumulation;
//! finalizing converts them into a mono 16-bit WAV clip at the session rate,
//! suitable for the transcription adapter and for the per-cycle slot file.

use crate::error::{Result, SottoError};
use crate::pipeline::messages::Frame;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};

/// Append-only buffer of frames for one in-progress utterance.
#[derive(Debug, Default)]
pub struct UtteranceBuffer {
    frames: Vec<Frame>,
}

impl UtteranceBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Append one frame in arrival order.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Number of buffered frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames have been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop all buffered frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Convert the buffered frames into a durable WAV clip.
    ///
    /// Consumes the buffer. Returns `Ok(None)` for an empty buffer — a
    /// defined no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if WAV encoding fails.
    pub fn finalize(self) -> Result<Option<UtteranceClip>> {
        let Some(first) = self.frames.first() else {
            return Ok(None);
        };
        let sample_rate = first.sample_rate;
        let started_at = first.captured_at;
        let frame_count = self.frames.len();

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| SottoError::Audio(format!("failed to create WAV writer: {e}")))?;

        let mut total_samples = 0usize;
        for frame in &self.frames {
            for &sample in &frame.samples {
                let clamped = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                writer
                    .write_sample(clamped)
                    .map_err(|e| SottoError::Audio(format!("failed to write WAV sample: {e}")))?;
            }
            total_samples += frame.samples.len();
        }
        writer
            .finalize()
            .map_err(|e| SottoError::Audio(format!("failed to finalize WAV: {e}")))?;

        let duration =
            Duration::from_secs_f64(total_samples as f64 / f64::from(sample_rate));

        Ok(Some(UtteranceClip {
            wav: cursor.into_inner(),
            frame_count,
            sample_rate,
            duration,
            started_at,
        }))
    }
}

/// A finalized utterance: one contiguous span of captured speech.
#[derive(Debug, Clone)]
pub struct UtteranceClip {
    /// Complete WAV container bytes (mono, 16-bit, session rate).
    pub wav: Vec<u8>,
    /// Number of frames that made up the utterance.
    pub frame_count: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Audio duration.
    pub duration: Duration,
    /// When the first frame of the utterance was captured.
    pub started_at: Instant,
}

impl UtteranceClip {
    /// Write the clip to the per-cycle slot file, overwriting any previous
    /// cycle's clip.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.wav)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn frame(samples: Vec<f32>) -> Frame {
        Frame {
            samples,
            sample_rate: 16_000,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn finalize_empty_buffer_is_a_no_op() {
        let buffer = UtteranceBuffer::new();
        assert!(buffer.finalize().unwrap().is_none());
    }

    #[test]
    fn finalize_produces_readable_wav() {
        let mut buffer = UtteranceBuffer::new();
        buffer.push(frame(vec![0.0; 480]));
        buffer.push(frame(vec![0.5; 480]));

        let clip = buffer.finalize().unwrap().expect("non-empty buffer");
        assert_eq!(clip.frame_count, 2);
        assert_eq!(clip.sample_rate, 16_000);

        let reader = hound::WavReader::new(Cursor::new(clip.wav.clone())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 960);
    }

    #[test]
    fn finalize_clamps_out_of_range_samples() {
        let mut buffer = UtteranceBuffer::new();
        buffer.push(frame(vec![2.0, -2.0]));

        let clip = buffer.finalize().unwrap().unwrap();
        let reader = hound::WavReader::new(Cursor::new(clip.wav)).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn duration_reflects_sample_count() {
        let mut buffer = UtteranceBuffer::new();
        // One second of audio at 16kHz split over frames.
        for _ in 0..10 {
            buffer.push(frame(vec![0.1; 1600]));
        }
        let clip = buffer.finalize().unwrap().unwrap();
        assert!((clip.duration.as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn write_to_creates_slot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot").join("utterance.wav");

        let mut buffer = UtteranceBuffer::new();
        buffer.push(frame(vec![0.1; 480]));
        let clip = buffer.finalize().unwrap().unwrap();

        clip.write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), clip.wav);
    }
}
