use std::io::Cursor;

use crate::audio::{sample_to_i16, silence_len};
use crate::error::TtsError;

pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Layout of a headerless PCM stream, declared once out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl StreamFormat {
    pub fn pcm16_mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: CHANNELS,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }
}

/// Encode f32 samples as a complete 16-bit PCM mono WAV (RIFF) file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, TtsError> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| TtsError::Encoding(format!("wav header: {e}")))?;
        for &s in samples {
            writer
                .write_sample(sample_to_i16(s))
                .map_err(|e| TtsError::Encoding(format!("wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| TtsError::Encoding(format!("wav finalize: {e}")))?;
    }

    Ok(cursor.into_inner())
}

/// Convert f32 samples to headerless little-endian 16-bit PCM.
pub fn encode_pcm16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        out.extend_from_slice(&sample_to_i16(s).to_le_bytes());
    }
    out
}

/// The trailing-silence frame for the raw PCM strategy.
pub fn silence_pcm16le(sample_rate: u32) -> Vec<u8> {
    vec![0u8; silence_len(sample_rate) * 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        let samples = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        (spec, samples)
    }

    #[test]
    fn test_encode_wav_declares_pcm16_mono() {
        let bytes = encode_wav(&[0.0, 0.5, -0.5], 24_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let (spec, samples) = read_back(&bytes);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(samples, vec![0, 16383, -16383]);
    }

    #[test]
    fn test_encode_wav_is_deterministic() {
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0).sin()).collect();
        let a = encode_wav(&samples, 22_050).unwrap();
        let b = encode_wav(&samples, 22_050).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_wav_empty_is_valid_container() {
        let bytes = encode_wav(&[], 24_000).unwrap();
        let (spec, samples) = read_back(&bytes);
        assert_eq!(spec.sample_rate, 24_000);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_encode_pcm16le_byte_order() {
        let bytes = encode_pcm16le(&[1.0, -1.0, 0.0]);
        assert_eq!(bytes, vec![0xFF, 0x7F, 0x01, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_silence_frame_length() {
        let frame = silence_pcm16le(24_000);
        assert_eq!(frame.len(), 24_000);
        assert!(frame.iter().all(|&b| b == 0));
    }
}
