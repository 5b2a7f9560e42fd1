//! Text-to-speech core: audio model, encoders, streaming strategies and the
//! Kokoro ONNX backend.

pub mod audio;
pub mod error;
pub mod kokoro;
pub mod manager;
pub mod stream;
pub mod synth;
pub mod voices;
pub mod wav;

pub use audio::{silence_len, AudioChunk, TRAILING_SILENCE_SECS};
pub use error::TtsError;
pub use kokoro::{KokoroModel, KokoroOptions};
pub use manager::{EncodedAudio, EncodedStream, StreamMode, TtsManager, DEFAULT_WORKERS};
pub use stream::{AudioStream, FrameStream};
pub use synth::{ChunkIter, SpeechSynthesizer, SynthesisRequest};
pub use voices::{list_voices, validate_voice, DEFAULT_VOICE, VOICES};
pub use wav::{encode_pcm16le, encode_wav, StreamFormat};
