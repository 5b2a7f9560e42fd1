//! Static voice catalog and the gate that runs ahead of every synthesis path.

use crate::error::TtsError;

pub const DEFAULT_VOICE: &str = "af_sarah";

pub const VOICES: &[&str] = &[
    "af_alloy",
    "af_aoede",
    "af_bella",
    "af_heart",
    "af_jessica",
    "af_kore",
    "af_nicole",
    "af_nova",
    "af_river",
    "af_sarah",
    "af_sky",
    "am_adam",
    "am_michael",
];

pub fn list_voices() -> Vec<String> {
    VOICES.iter().map(|v| v.to_string()).collect()
}

pub fn is_known_voice(voice: &str) -> bool {
    VOICES.contains(&voice)
}

/// Reject voices outside the catalog.
pub fn validate_voice(voice: &str) -> Result<(), TtsError> {
    if is_known_voice(voice) {
        Ok(())
    } else {
        Err(TtsError::UnknownVoice(voice.to_string()))
    }
}
