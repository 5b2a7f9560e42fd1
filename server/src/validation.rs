use crate::error::ApiError;
use tts_core::{validate_voice, SynthesisRequest};

/// Maximum text length for TTS requests
const MAX_TEXT_LENGTH: usize = 5000;
/// Upper bound for the speed multiplier
const MAX_SPEED: f32 = 4.0;

/// Validate TTS request
pub fn validate_tts_request(req: &SynthesisRequest) -> Result<(), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if req.text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    validate_voice(&req.voice)?;

    if !req.speed.is_finite() || req.speed <= 0.0 || req.speed > MAX_SPEED {
        return Err(ApiError::InvalidInput(format!(
            "Invalid speed {}. Expected a value in (0, {}]",
            req.speed, MAX_SPEED
        )));
    }

    if !is_valid_language_tag(&req.lang) {
        return Err(ApiError::InvalidInput(format!(
            "Invalid language tag: {}. Expected format like en-us or en-gb",
            req.lang
        )));
    }

    Ok(())
}

/// espeak-style language tag: lowercase letters and digits joined by '-'
fn is_valid_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 16
        && tag.split('-').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}
