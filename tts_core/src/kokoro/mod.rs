//! Kokoro-82M inference through onnxruntime.

mod phonemizer;
mod vocab;
mod voice_table;

pub use phonemizer::{EspeakPhonemizer, Phonemizer};
pub use voice_table::VoiceTable;

use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::audio::AudioChunk;
use crate::synth::{ChunkIter, SpeechSynthesizer, SynthesisRequest};
use crate::voices::VOICES;
use vocab::{split_phonemes, tokenize, MAX_PHONEME_LENGTH, PAD_TOKEN};

pub const SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_MODEL_PATH: &str = "kokoro-v1.0.onnx";
pub const DEFAULT_VOICES_PATH: &str = "voices-v1.0.bin";

/// Runtime knobs handed through to onnxruntime and the phonemizer.
#[derive(Debug, Clone)]
pub struct KokoroOptions {
    pub intra_threads: Option<usize>,
    pub espeak_program: String,
}

impl Default for KokoroOptions {
    fn default() -> Self {
        Self {
            intra_threads: None,
            espeak_program: "espeak-ng".to_string(),
        }
    }
}

pub struct KokoroModel {
    session: Session,
    token_input: String,
    voices: VoiceTable,
    phonemizer: Box<dyn Phonemizer>,
}

// Manual Debug implementation since Session doesn't implement Debug
impl std::fmt::Debug for KokoroModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KokoroModel")
            .field("session", &"<ort::Session>")
            .field("token_input", &self.token_input)
            .field("voices", &self.voices.names().count())
            .finish()
    }
}

impl KokoroModel {
    /// Load the ONNX graph and the voice archive. Any failure here is fatal
    /// for the process.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        model_path: P,
        voices_path: Q,
        options: &KokoroOptions,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let phonemizer = EspeakPhonemizer::new(options.espeak_program.clone())?;

        let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(threads) = options.intra_threads {
            builder = builder.with_intra_threads(threads)?;
        }
        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        // kokoro-v1.0 names its token input "tokens", older exports "input_ids"
        let token_input = if session.inputs.iter().any(|i| i.name == "input_ids") {
            "input_ids".to_string()
        } else {
            "tokens".to_string()
        };

        let voices = VoiceTable::load(voices_path)?;
        for voice in VOICES {
            if voices.get(voice).is_err() {
                tracing::warn!("Catalog voice '{voice}' is missing from the voices archive");
            }
        }
        info!(
            "Loaded Kokoro model {} ({} voices)",
            model_path.display(),
            voices.names().count()
        );

        Ok(Self {
            session,
            token_input,
            voices,
            phonemizer: Box::new(phonemizer),
        })
    }

    fn infer(&self, phonemes: &str, voice: &str, speed: f32) -> Result<AudioChunk> {
        let tokens = tokenize(phonemes);
        if tokens.is_empty() {
            return Ok(AudioChunk::new(Vec::new(), SAMPLE_RATE));
        }
        if tokens.len() >= MAX_PHONEME_LENGTH {
            bail!("phoneme batch has {} tokens (max {})", tokens.len(), MAX_PHONEME_LENGTH - 1);
        }

        let style = self.voices.get(voice)?;
        let style_row = style.row_for(tokens.len()).to_vec();

        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(PAD_TOKEN);
        padded.extend_from_slice(&tokens);
        padded.push(PAD_TOKEN);

        let tokens = Array2::from_shape_vec((1, padded.len()), padded).context("token tensor shape")?;
        let style = Array2::from_shape_vec((1, style.cols()), style_row).context("style tensor shape")?;
        let speed = Array1::from_vec(vec![speed]);

        let outputs = self.session.run(ort::inputs![
            self.token_input.as_str() => Tensor::from_array(tokens)?,
            "style" => Tensor::from_array(style)?,
            "speed" => Tensor::from_array(speed)?
        ]?)?;

        let audio = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;
        Ok(AudioChunk::new(audio.iter().copied().collect(), SAMPLE_RATE))
    }
}

impl SpeechSynthesizer for KokoroModel {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn chunks<'a>(&'a self, request: &SynthesisRequest) -> Result<ChunkIter<'a>> {
        let phonemes = self
            .phonemizer
            .phonemize(&request.text, &request.lang)
            .context("Phonemization failed")?;
        let batches = split_phonemes(&phonemes);
        debug!("Synthesizing {} phoneme batch(es)", batches.len());

        let voice = request.voice.clone();
        let speed = request.speed;
        Ok(Box::new(
            batches
                .into_iter()
                .map(move |batch| self.infer(&batch, &voice, speed)),
        ))
    }
}
