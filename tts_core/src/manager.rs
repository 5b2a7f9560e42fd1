use std::str::FromStr;
use std::sync::Arc;

use futures_util::stream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::audio::AudioChunk;
use crate::error::TtsError;
use crate::stream::{
    collect_stream, pcm_frames, spawn_chunk_stream, split_first, wav_frames, AudioStream,
    FrameStream,
};
use crate::synth::{SpeechSynthesizer, SynthesisRequest};
use crate::voices::validate_voice;
use crate::wav::{encode_wav, StreamFormat};

pub const DEFAULT_WORKERS: usize = 4;

/// How `/tts/stream` delivers audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Aggregate every chunk, then send one WAV file.
    Buffered,
    /// One complete WAV file per model chunk.
    WavChunks,
    /// Headerless PCM frames; format travels in response headers.
    #[default]
    RawPcm,
}

impl StreamMode {
    pub fn content_type(&self) -> &'static str {
        match self {
            StreamMode::Buffered | StreamMode::WavChunks => "audio/wav",
            StreamMode::RawPcm => "audio/pcm",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Buffered => "buffered",
            StreamMode::WavChunks => "wav",
            StreamMode::RawPcm => "pcm",
        }
    }
}

impl FromStr for StreamMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" | "whole" => Ok(StreamMode::Buffered),
            "wav" | "wav_chunks" => Ok(StreamMode::WavChunks),
            "pcm" | "raw" => Ok(StreamMode::RawPcm),
            other => Err(anyhow::anyhow!(
                "unknown stream mode '{other}' (expected buffered, wav or pcm)"
            )),
        }
    }
}

/// A complete WAV file plus what the caller needs to report about it.
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    /// Samples including the trailing silence.
    pub samples: usize,
    pub duration_ms: u64,
}

impl EncodedAudio {
    fn from_chunk(audio: &AudioChunk) -> Result<Self, TtsError> {
        Ok(Self {
            wav: encode_wav(&audio.samples, audio.sample_rate)?,
            sample_rate: audio.sample_rate,
            samples: audio.samples.len(),
            duration_ms: audio.duration_ms(),
        })
    }
}

/// Frames for a streaming response, with the metadata that goes in its headers.
pub struct EncodedStream {
    pub mode: StreamMode,
    /// Set for raw PCM only; containers describe themselves.
    pub format: Option<StreamFormat>,
    pub frames: FrameStream,
}

impl EncodedStream {
    fn empty(mode: StreamMode, format: Option<StreamFormat>) -> Self {
        Self {
            mode,
            format,
            frames: Box::pin(stream::empty::<Vec<u8>>()),
        }
    }
}

/// Entry point for every synthesis path.
///
/// Owns the process-wide model handle and a bounded pool of permits that
/// caps how many blocking synthesis calls run at once. The voice gate runs
/// before a permit is even requested.
#[derive(Clone)]
pub struct TtsManager {
    model: Arc<dyn SpeechSynthesizer>,
    workers: Arc<Semaphore>,
    worker_count: usize,
}

impl TtsManager {
    pub fn new(model: Arc<dyn SpeechSynthesizer>) -> Self {
        Self::with_workers(model, DEFAULT_WORKERS)
    }

    pub fn with_workers(model: Arc<dyn SpeechSynthesizer>, workers: usize) -> Self {
        let worker_count = workers.max(1);
        info!("TTS worker pool size: {worker_count}");
        Self {
            model,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.model.sample_rate()
    }

    async fn acquire_worker(&self) -> Result<OwnedSemaphorePermit, TtsError> {
        self.workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TtsError::Worker(e.to_string()))
    }

    /// Whole-utterance synthesis on the worker pool, padded with trailing
    /// silence. `Ok(None)` when the model produced no chunks.
    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<Option<AudioChunk>, TtsError> {
        validate_voice(&request.voice)?;
        let permit = self.acquire_worker().await?;
        let model = Arc::clone(&self.model);

        let audio = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            model.synthesize(&request)
        })
        .await
        .map_err(|e| TtsError::Worker(format!("Task join error: {e}")))??;

        let Some(mut audio) = audio else {
            debug!("Synthesis produced no chunks");
            return Ok(None);
        };

        audio.pad_trailing_silence();
        Ok(Some(audio))
    }

    /// Whole-utterance synthesis encoded as one WAV file.
    pub async fn synthesize_wav(&self, request: SynthesisRequest) -> Result<Option<EncodedAudio>, TtsError> {
        match self.synthesize(request).await? {
            Some(audio) => Ok(Some(EncodedAudio::from_chunk(&audio)?)),
            None => Ok(None),
        }
    }

    /// Incremental synthesis. The model runs on the worker pool and the
    /// permit is held until the stream finishes or is dropped.
    pub async fn stream(&self, request: SynthesisRequest) -> Result<AudioStream, TtsError> {
        validate_voice(&request.voice)?;
        let permit = self.acquire_worker().await?;
        Ok(spawn_chunk_stream(Arc::clone(&self.model), request, Some(permit)))
    }

    /// Incremental synthesis encoded for the given delivery strategy.
    ///
    /// Whatever can still fail before the first byte is sent surfaces as an
    /// `Err` here: every error in buffered mode, and errors before the first
    /// chunk in the per-chunk modes. Later failures end the frame stream early.
    pub async fn stream_encoded(
        &self,
        request: SynthesisRequest,
        mode: StreamMode,
    ) -> Result<EncodedStream, TtsError> {
        let chunks = self.stream(request).await?;

        match mode {
            StreamMode::Buffered => match collect_stream(chunks).await? {
                Some(audio) => {
                    let wav = encode_wav(&audio.samples, audio.sample_rate)?;
                    Ok(EncodedStream {
                        mode,
                        format: None,
                        frames: Box::pin(stream::once(async move { wav })),
                    })
                }
                None => Ok(EncodedStream::empty(mode, None)),
            },
            StreamMode::WavChunks => match split_first(chunks).await? {
                Some((first, rest)) => Ok(EncodedStream {
                    mode,
                    format: None,
                    frames: wav_frames(first, rest),
                }),
                None => Ok(EncodedStream::empty(mode, None)),
            },
            StreamMode::RawPcm => match split_first(chunks).await? {
                Some((first, rest)) => Ok(EncodedStream {
                    mode,
                    format: Some(StreamFormat::pcm16_mono(first.sample_rate)),
                    frames: pcm_frames(first, rest),
                }),
                None => Ok(EncodedStream::empty(
                    mode,
                    Some(StreamFormat::pcm16_mono(self.sample_rate())),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ChunkIter;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl Counting {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl SpeechSynthesizer for Counting {
        fn sample_rate(&self) -> u32 {
            10
        }

        fn chunks<'a>(&'a self, request: &SynthesisRequest) -> anyhow::Result<ChunkIter<'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let words: Vec<f32> = request
                .text
                .split_whitespace()
                .map(|w| w.len() as f32 / 10.0)
                .collect();
            Ok(Box::new(
                words
                    .into_iter()
                    .map(|s| Ok::<_, anyhow::Error>(AudioChunk::new(vec![s], 10))),
            ))
        }
    }

    #[test]
    fn test_stream_mode_parse() {
        assert_eq!("pcm".parse::<StreamMode>().unwrap(), StreamMode::RawPcm);
        assert_eq!("WAV".parse::<StreamMode>().unwrap(), StreamMode::WavChunks);
        assert_eq!(" buffered ".parse::<StreamMode>().unwrap(), StreamMode::Buffered);
        assert!("mp3".parse::<StreamMode>().is_err());
        assert_eq!(StreamMode::default().content_type(), "audio/pcm");
    }

    #[tokio::test]
    async fn test_unknown_voice_never_reaches_model() {
        let model = Arc::new(Counting::new(Duration::ZERO));
        let manager = TtsManager::new(model.clone());
        let request = SynthesisRequest::new("hello").with_voice("nonexistent");

        assert!(matches!(
            manager.synthesize_wav(request.clone()).await,
            Err(TtsError::UnknownVoice(_))
        ));
        assert!(matches!(
            manager.stream(request).await,
            Err(TtsError::UnknownVoice(_))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesize_pads_silence() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let audio = manager
            .synthesize(SynthesisRequest::new("ab cde"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audio.samples, vec![0.2, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_synthesize_empty_is_none() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        assert!(manager
            .synthesize_wav(SynthesisRequest::new("   "))
            .await
            .unwrap()
            .is_none());
    }

    struct SilentBatch;

    impl SpeechSynthesizer for SilentBatch {
        fn sample_rate(&self) -> u32 {
            10
        }

        fn chunks<'a>(&'a self, _request: &SynthesisRequest) -> anyhow::Result<ChunkIter<'a>> {
            Ok(Box::new(std::iter::once(anyhow::Ok(AudioChunk::new(Vec::new(), 10)))))
        }
    }

    #[tokio::test]
    async fn test_synthesize_empty_chunk_still_padded() {
        let manager = TtsManager::new(Arc::new(SilentBatch));
        let audio = manager
            .synthesize(SynthesisRequest::new("..."))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audio.samples, vec![0.0; 5]);

        let encoded = manager
            .stream_encoded(SynthesisRequest::new("..."), StreamMode::Buffered)
            .await
            .unwrap();
        let frames: Vec<Vec<u8>> = encoded.frames.collect().await;
        let whole = manager
            .synthesize_wav(SynthesisRequest::new("..."))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frames, vec![whole.wav]);
    }

    #[tokio::test]
    async fn test_stream_encoded_wav_chunks_empty() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let encoded = manager
            .stream_encoded(SynthesisRequest::new(""), StreamMode::WavChunks)
            .await
            .unwrap();
        assert!(encoded.format.is_none());
        let frames: Vec<Vec<u8>> = encoded.frames.collect().await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_wav_is_idempotent() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let a = manager
            .synthesize_wav(SynthesisRequest::new("one two three"))
            .await
            .unwrap()
            .unwrap();
        let b = manager
            .synthesize_wav(SynthesisRequest::new("one two three"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.wav, b.wav);
        assert_eq!(a.samples, 3 + 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_bounds_concurrency() {
        let model = Arc::new(Counting::new(Duration::from_millis(50)));
        let manager = TtsManager::with_workers(model.clone(), 2);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.synthesize(SynthesisRequest::new("hi")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(model.calls.load(Ordering::SeqCst), 6);
        assert!(model.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_stream_encoded_raw_pcm_declares_format() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let encoded = manager
            .stream_encoded(SynthesisRequest::new("a bb"), StreamMode::RawPcm)
            .await
            .unwrap();
        assert_eq!(encoded.format, Some(StreamFormat::pcm16_mono(10)));

        let frames: Vec<Vec<u8>> = encoded.frames.collect().await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], vec![0u8; 10]);
    }

    #[tokio::test]
    async fn test_stream_encoded_empty_uses_nominal_rate() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let encoded = manager
            .stream_encoded(SynthesisRequest::new(""), StreamMode::RawPcm)
            .await
            .unwrap();
        assert_eq!(encoded.format.map(|f| f.sample_rate), Some(10));
        let frames: Vec<Vec<u8>> = encoded.frames.collect().await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_stream_encoded_buffered_single_wav() {
        let manager = TtsManager::new(Arc::new(Counting::new(Duration::ZERO)));
        let encoded = manager
            .stream_encoded(SynthesisRequest::new("a bb ccc"), StreamMode::Buffered)
            .await
            .unwrap();
        assert!(encoded.format.is_none());

        let frames: Vec<Vec<u8>> = encoded.frames.collect().await;
        assert_eq!(frames.len(), 1);
        let reader = hound::WavReader::new(std::io::Cursor::new(&frames[0])).unwrap();
        assert_eq!(reader.len(), 3 + 5);
    }
}
