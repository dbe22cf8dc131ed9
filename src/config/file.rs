//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MurmurConfigFile {
    /// Models directory override
    #[serde(default)]
    pub models_dir: Option<String>,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Panel server configuration
    #[serde(default)]
    pub panel: PanelFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// System prompt prepended to every exchange
    pub system_prompt: Option<String>,

    /// Max tokens to generate per reply
    pub max_tokens: Option<usize>,

    /// Sampling temperature
    pub temperature: Option<f64>,

    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,

    /// Repeat penalty (1.0 = no penalty)
    pub repeat_penalty: Option<f32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Seconds to wait for speech before a listen timeout
    pub listen_timeout_secs: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Panel server configuration
#[derive(Debug, Default, Deserialize)]
pub struct PanelFileConfig {
    /// Panel HTTP port
    pub port: Option<u16>,

    /// Static files directory overriding the embedded page
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MurmurConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MurmurConfigFile {
    let Some(path) = config_file_path() else {
        return MurmurConfigFile::default();
    };

    if !path.exists() {
        return MurmurConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MurmurConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MurmurConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml"))
}
