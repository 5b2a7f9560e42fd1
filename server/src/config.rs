// Configuration for the server, read from the environment

use std::time::Duration;

use tracing::warn;
use tts_core::kokoro::{DEFAULT_MODEL_PATH, DEFAULT_VOICES_PATH};
use tts_core::{KokoroOptions, StreamMode, DEFAULT_WORKERS};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub model_path: String,
    pub voices_path: String,
    pub workers: usize,
    pub stream_mode: StreamMode,
    pub ort_intra_threads: Option<usize>,
    pub espeak_program: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            voices_path: DEFAULT_VOICES_PATH.to_string(),
            workers: DEFAULT_WORKERS,
            stream_mode: StreamMode::default(),
            ort_intra_threads: None,
            espeak_program: "espeak-ng".to_string(),
            request_timeout_secs: 120,
            max_body_bytes: 64 * 1024,
            cors_allowed_origins: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let stream_mode = match std::env::var("TTS_STREAM_MODE") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                warn!("{e}, using {}", defaults.stream_mode.as_str());
                defaults.stream_mode
            }),
            Err(_) => defaults.stream_mode,
        };

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            model_path: std::env::var("KOKORO_MODEL_PATH").unwrap_or(defaults.model_path),
            voices_path: std::env::var("KOKORO_VOICES_PATH").unwrap_or(defaults.voices_path),
            workers: env_parse("TTS_WORKERS").unwrap_or(defaults.workers),
            stream_mode,
            ort_intra_threads: env_parse("ORT_INTRA_THREADS"),
            espeak_program: std::env::var("ESPEAK_PROGRAM").unwrap_or(defaults.espeak_program),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            cors_allowed_origins,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn kokoro_options(&self) -> KokoroOptions {
        KokoroOptions {
            intra_threads: self.ort_intra_threads,
            espeak_program: self.espeak_program.clone(),
        }
    }
}
