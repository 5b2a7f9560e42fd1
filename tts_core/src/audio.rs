//! Audio data model shared by every delivery strategy.

/// Length of the zero-valued tail appended once at the very end of an utterance.
pub const TRAILING_SILENCE_SECS: f32 = 0.5;

/// One unit of incrementally produced audio, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u64
    }

    /// Append the trailing silence sized for this chunk's sample rate.
    pub fn pad_trailing_silence(&mut self) {
        let len = silence_len(self.sample_rate);
        self.samples.resize(self.samples.len() + len, 0.0);
    }
}

/// Number of silent samples in the trailing pad: `round(sample_rate * 0.5)`.
pub fn silence_len(sample_rate: u32) -> usize {
    (sample_rate as f64 * TRAILING_SILENCE_SECS as f64).round() as usize
}

/// Convert a float sample to 16-bit PCM.
///
/// Input is clamped to [-1.0, 1.0] before scaling by `i16::MAX` and
/// truncating, so out-of-range model output saturates instead of wrapping.
/// NaN maps to 0.
#[inline]
pub fn sample_to_i16(s: f32) -> i16 {
    const I16_MAX_F32: f32 = i16::MAX as f32;
    (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16
}
