//! Text-to-speech over cloud APIs

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f64,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Build a TTS client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or its API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        match voice.tts_provider.as_str() {
            "openai" => {
                let api_key = keys.openai.clone().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY required for OpenAI TTS".to_string())
                })?;
                Ok(Self {
                    client: reqwest::Client::new(),
                    api_key,
                    voice: voice.tts_voice.clone(),
                    speed: voice.tts_speed,
                    model: voice.tts_model.clone(),
                    provider: TtsProvider::OpenAI,
                })
            }
            "elevenlabs" => {
                let api_key = keys.elevenlabs.clone().ok_or_else(|| {
                    Error::Config("ELEVENLABS_API_KEY required for ElevenLabs TTS".to_string())
                })?;
                Ok(Self {
                    client: reqwest::Client::new(),
                    api_key,
                    voice: voice.tts_voice.clone(),
                    speed: 1.0, // ElevenLabs doesn't take a speed parameter
                    model: voice.tts_model.clone(),
                    provider: TtsProvider::ElevenLabs,
                })
            }
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_openai() {
        let voice = VoiceConfig::default();
        let keys = ApiKeys {
            openai: Some("sk-test".to_string()),
            ..ApiKeys::default()
        };
        assert!(TextToSpeech::from_config(&voice, &keys).is_ok());
    }

    #[test]
    fn test_from_config_elevenlabs_requires_key() {
        let voice = VoiceConfig {
            tts_provider: "elevenlabs".to_string(),
            ..VoiceConfig::default()
        };
        assert!(matches!(
            TextToSpeech::from_config(&voice, &ApiKeys::default()),
            Err(Error::Config(_))
        ));
    }
}
