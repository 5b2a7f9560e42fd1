use serde::{Deserialize, Serialize};

use crate::audio::AudioChunk;
use crate::voices::DEFAULT_VOICE;

pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_LANG: &str = "en-us";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

fn default_lang() -> String {
    DEFAULT_LANG.to_string()
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: default_voice(),
            speed: DEFAULT_SPEED,
            lang: default_lang(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

/// Lazy, finite sequence of chunks produced by a synthesizer.
pub type ChunkIter<'a> = Box<dyn Iterator<Item = anyhow::Result<AudioChunk>> + Send + 'a>;

/// The inference collaborator.
///
/// Implementations are shared read-only across concurrent requests and may
/// block the calling thread for the whole synthesis, so callers run them on
/// blocking worker threads.
pub trait SpeechSynthesizer: Send + Sync {
    /// Nominal output rate, used when no chunk has been observed yet.
    fn sample_rate(&self) -> u32;

    /// Produce audio incrementally. Each call to `next` may block until the
    /// model has generated the next chunk.
    fn chunks<'a>(&'a self, request: &SynthesisRequest) -> anyhow::Result<ChunkIter<'a>>;

    /// Produce the whole utterance in one call. `Ok(None)` when the model
    /// yielded no chunks at all.
    fn synthesize(&self, request: &SynthesisRequest) -> anyhow::Result<Option<AudioChunk>> {
        let mut combined: Option<AudioChunk> = None;
        for chunk in self.chunks(request)? {
            let chunk = chunk?;
            match combined.as_mut() {
                Some(acc) => acc.samples.extend_from_slice(&chunk.samples),
                None => combined = Some(chunk),
            }
        }
        Ok(combined)
    }
}
