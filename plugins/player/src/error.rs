use serde::{Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Player unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid base64 audio: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Audio error: {0}")]
    Audio(#[from] murmur_audio::AudioError),
}

impl Serialize for PlayerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
