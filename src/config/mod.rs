//! Configuration management for murmur

pub mod file;

use std::path::{Path, PathBuf};

use crate::Result;

/// Murmur configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for `.gguf` model files
    pub models_dir: PathBuf,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Local inference configuration
    pub llm: LlmConfig,

    /// Panel server configuration
    pub panel: PanelConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: String,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Seconds to wait for speech before a listen timeout
    pub listen_timeout_secs: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_provider: "whisper".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_provider: "openai".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            listen_timeout_secs: 5.0,
        }
    }
}

/// Local inference configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// System prompt prepended to every exchange
    pub system_prompt: String,

    /// Max tokens to generate per reply
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: f64,

    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,

    /// Seed for the sampling RNG
    pub seed: u64,

    /// Penalty applied to repeating tokens, 1.0 means no penalty
    pub repeat_penalty: f32,

    /// Context window considered for the repeat penalty
    pub repeat_last_n: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            max_tokens: 256,
            temperature: 0.8,
            top_p: None,
            seed: 299_792_458,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
        }
    }
}

/// Panel server configuration
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Port the panel listens on
    pub port: u16,

    /// Static files directory overriding the embedded page
    pub static_dir: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            port: 7791,
            static_dir: None,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for Whisper STT and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration with layering: env > TOML file > defaults
    ///
    /// # Errors
    ///
    /// Returns error if the working directory cannot be determined when no
    /// models directory is given anywhere else
    pub fn load(models_dir: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();

        let models_dir = models_dir.map(Path::to_path_buf).or_else(|| {
            std::env::var("MURMUR_MODELS_DIR")
                .ok()
                .map(PathBuf::from)
                .or_else(|| fc.models_dir.as_ref().map(PathBuf::from))
        });
        let models_dir = match models_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?.join("models"),
        };

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        let voice_default = VoiceConfig::default();
        let voice_enabled = if disable_voice {
            false
        } else {
            fc.voice.enabled.unwrap_or(true)
        };
        let voice = VoiceConfig {
            enabled: voice_enabled,
            stt_provider: std::env::var("MURMUR_STT_PROVIDER")
                .ok()
                .or(fc.voice.stt_provider)
                .unwrap_or(voice_default.stt_provider),
            stt_model: std::env::var("MURMUR_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or(voice_default.stt_model),
            tts_provider: std::env::var("MURMUR_TTS_PROVIDER")
                .ok()
                .or(fc.voice.tts_provider)
                .unwrap_or(voice_default.tts_provider),
            tts_model: std::env::var("MURMUR_TTS_MODEL")
                .ok()
                .or(fc.voice.tts_model)
                .unwrap_or(voice_default.tts_model),
            tts_voice: std::env::var("MURMUR_TTS_VOICE")
                .ok()
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_default.tts_voice),
            tts_speed: std::env::var("MURMUR_TTS_SPEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.voice.tts_speed)
                .unwrap_or(voice_default.tts_speed),
            listen_timeout_secs: std::env::var("MURMUR_LISTEN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.voice.listen_timeout_secs)
                .unwrap_or(voice_default.listen_timeout_secs),
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --no-voice");
        }

        let llm_default = LlmConfig::default();
        let llm = LlmConfig {
            system_prompt: std::env::var("MURMUR_SYSTEM_PROMPT")
                .ok()
                .or(fc.llm.system_prompt)
                .unwrap_or(llm_default.system_prompt),
            max_tokens: std::env::var("MURMUR_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.llm.max_tokens)
                .unwrap_or(llm_default.max_tokens),
            temperature: std::env::var("MURMUR_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.llm.temperature)
                .unwrap_or(llm_default.temperature),
            top_p: fc.llm.top_p.or(llm_default.top_p),
            seed: llm_default.seed,
            repeat_penalty: fc.llm.repeat_penalty.unwrap_or(llm_default.repeat_penalty),
            repeat_last_n: llm_default.repeat_last_n,
        };

        let panel_default = PanelConfig::default();
        let panel = PanelConfig {
            port: std::env::var("MURMUR_PANEL_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.panel.port)
                .unwrap_or(panel_default.port),
            static_dir: std::env::var("MURMUR_STATIC_DIR")
                .ok()
                .map(PathBuf::from)
                .or_else(|| fc.panel.static_dir.as_ref().map(PathBuf::from)),
        };

        Ok(Self {
            models_dir,
            voice,
            llm,
            panel,
            api_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_defaults() {
        let voice = VoiceConfig::default();
        assert!(voice.enabled);
        assert_eq!(voice.stt_provider, "whisper");
        assert_eq!(voice.tts_voice, "alloy");
        assert!((voice.listen_timeout_secs - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_llm_defaults() {
        let llm = LlmConfig::default();
        assert_eq!(llm.max_tokens, 256);
        assert!(llm.repeat_penalty > 1.0);
        assert!(!llm.system_prompt.is_empty());
    }
}
