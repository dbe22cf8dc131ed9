//! Error types for murmur

use thiserror::Error;

/// Result type alias for murmur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in murmur
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio capture or playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// The audio was captured but nothing intelligible was recognized
    #[error("no speech recognized")]
    NoSpeech,

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Model loading or inference error
    #[error("model error: {0}")]
    Model(String),

    /// Tensor-level inference error
    #[error("inference error: {0}")]
    Inference(#[from] candle::Error),

    /// Model catalog error (unknown or invalid model file)
    #[error("catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
