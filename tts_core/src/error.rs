use thiserror::Error;

/// Failure kinds surfaced by the synthesis pipeline.
///
/// `UnknownVoice` is a client input error and is raised before the model is
/// touched; everything else originates at or after the inference boundary.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Unknown voice '{0}'. Use /voices to list available voices.")]
    UnknownVoice(String),

    #[error("{0}")]
    Inference(#[from] anyhow::Error),

    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    #[error("Synthesis worker failed: {0}")]
    Worker(String),
}

impl TtsError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, TtsError::UnknownVoice(_))
    }
}
