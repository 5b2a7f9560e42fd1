//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{Request, Response},
    Router,
};
use futures_util::StreamExt;
use serde_json::Value;
use tower::ServiceExt;
use tts_core::{AudioChunk, ChunkIter, SpeechSynthesizer, StreamMode, SynthesisRequest, TtsManager};

use server::config::ServerConfig;
use server::{router, AppState};

pub const FAKE_RATE: u32 = 24_000;

/// Deterministic stand-in for the Kokoro model.
///
/// Yields a fixed list of chunks, optionally failing at a given index. With a
/// gate, every chunk after the first waits for a release signal, so a test can
/// observe the response while synthesis is still in progress.
pub struct FakeSynth {
    chunks: Vec<Vec<f32>>,
    sample_rate: u32,
    fail_at: Option<usize>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
    calls: AtomicUsize,
}

impl FakeSynth {
    pub fn new(chunks: Vec<Vec<f32>>) -> Self {
        Self {
            chunks,
            sample_rate: FAKE_RATE,
            fail_at: None,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Returns the sender that releases one gated chunk per message.
    pub fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(Mutex::new(rx));
        (self, tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for FakeSynth {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn chunks<'a>(&'a self, _request: &SynthesisRequest) -> anyhow::Result<ChunkIter<'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = self.fail_at.map_or(self.chunks.len(), |i| (i + 1).max(self.chunks.len()));
        Ok(Box::new((0..len).map(move |i| -> anyhow::Result<AudioChunk> {
            if i > 0 {
                if let Some(gate) = &self.gate {
                    gate.lock()
                        .map_err(|_| anyhow::anyhow!("gate poisoned"))?
                        .recv()
                        .map_err(|_| anyhow::anyhow!("gate closed"))?;
                }
            }
            if self.fail_at == Some(i) {
                anyhow::bail!("fake inference failure");
            }
            Ok(AudioChunk::new(self.chunks[i].clone(), self.sample_rate))
        })))
    }
}

/// Build the real router over a fake synthesizer.
pub fn create_test_app(fake: Arc<FakeSynth>, mode: StreamMode) -> Router {
    let config = ServerConfig {
        stream_mode: mode,
        ..ServerConfig::default()
    };
    let tts = TtsManager::with_workers(fake, config.workers);
    router(AppState::new(tts, config))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Every frame of a streaming body, as sent.
pub async fn body_frames(response: Response<Body>) -> Vec<Bytes> {
    response
        .into_body()
        .into_data_stream()
        .map(|frame| frame.unwrap())
        .collect()
        .await
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

/// (spec, samples) of a WAV payload.
pub fn read_wav(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    let samples = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    (spec, samples)
}

pub fn pcm16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
