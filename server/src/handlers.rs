use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures_util::StreamExt;
use serde::Serialize;
use tracing::info;
use tts_core::{list_voices, StreamMode, SynthesisRequest};

use crate::error::ApiError;
use crate::metrics::{DetailedMetricsResponse, EndpointMetricsResponse, EndpointStats, SystemMetrics};
use crate::validation::validate_tts_request;
use crate::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct VoicesResponse {
    voices: Vec<String>,
}

pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn voices() -> Json<VoicesResponse> {
    Json(VoicesResponse { voices: list_voices() })
}

pub(crate) static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let uptime = START_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0);

    // Unix-like systems only
    let system_load = {
        #[cfg(unix)]
        {
            std::fs::read_to_string("/proc/loadavg")
                .ok()
                .and_then(|l| l.split_whitespace().next().and_then(|s| s.parse::<f64>().ok()))
        }
        #[cfg(not(unix))]
        None
    };

    Json(DetailedMetricsResponse {
        timestamp: Utc::now(),
        system: SystemMetrics {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count: state.request_count.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            system_load,
            tts_workers: state.tts.worker_count(),
            stream_mode: state.config.stream_mode.as_str(),
        },
        endpoints: EndpointMetricsResponse {
            tts: EndpointStats::from(&state.metrics.tts),
            tts_stream: EndpointStats::from(&state.metrics.tts_stream),
        },
        tts: state.metrics.synthesis.snapshot(),
    })
}

/// `POST /tts`: the whole utterance as one WAV file.
pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();

    let result = synthesize_wav(&state, req).await;
    let elapsed = start.elapsed().as_millis() as u64;
    state.metrics.tts.record_request(elapsed);
    if result.is_err() {
        state.metrics.tts.record_error();
    }
    result
}

async fn synthesize_wav(state: &AppState, req: SynthesisRequest) -> Result<Response, ApiError> {
    validate_tts_request(&req)?;

    let start = Instant::now();
    let audio = state.tts.synthesize_wav(req).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let Some(audio) = audio else {
        state.metrics.synthesis.record_synthesis(elapsed, 0);
        info!("Synthesis produced no audio ({} ms)", elapsed);
        return Ok(wav_response(Vec::new()));
    };

    state.metrics.synthesis.record_synthesis(elapsed, audio.samples);
    info!(
        "Synthesized {} ms of audio at {} Hz in {} ms",
        audio.duration_ms, audio.sample_rate, elapsed
    );
    Ok(wav_response(audio.wav))
}

fn wav_response(wav: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, StreamMode::Buffered.content_type()),
            (header::CONTENT_DISPOSITION, "inline; filename=speech.wav"),
        ],
        wav,
    )
        .into_response()
}

/// `POST /tts/stream`: frames in the configured delivery strategy.
pub async fn tts_stream_endpoint(
    State(state): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();

    // Latency here is time to headers; the body keeps flowing afterwards.
    let result = open_stream(&state, req).await;
    state.metrics.tts_stream.record_request(start.elapsed().as_millis() as u64);
    if result.is_err() {
        state.metrics.tts_stream.record_error();
    }
    result
}

async fn open_stream(state: &AppState, req: SynthesisRequest) -> Result<Response, ApiError> {
    validate_tts_request(&req)?;

    let mode = state.config.stream_mode;
    let encoded = state.tts.stream_encoded(req, mode).await?;
    state.metrics.synthesis.record_stream();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoded.mode.content_type());
    if let Some(format) = encoded.format {
        builder = builder
            .header("X-Sample-Rate", format.sample_rate)
            .header("X-Channels", format.channels)
            .header("X-Bit-Depth", format.bits_per_sample);
    }

    let body = Body::from_stream(encoded.frames.map(Ok::<_, Infallible>));
    builder
        .body(body)
        .map_err(|e| ApiError::InternalError(format!("Failed to build response: {e}")))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("No such route".to_string())
}
