//! Speech-to-text over cloud APIs

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// Response from the OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from the Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Build an STT client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or its API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        match voice.stt_provider.as_str() {
            "whisper" | "openai" => {
                let api_key = keys.openai.clone().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY required for Whisper STT".to_string())
                })?;
                Ok(Self {
                    client: reqwest::Client::new(),
                    api_key,
                    model: voice.stt_model.clone(),
                    provider: SttProvider::Whisper,
                })
            }
            "deepgram" => {
                let api_key = keys.deepgram.clone().ok_or_else(|| {
                    Error::Config("DEEPGRAM_API_KEY required for Deepgram STT".to_string())
                })?;
                Ok(Self {
                    client: reqwest::Client::new(),
                    api_key,
                    model: voice.stt_model.clone(),
                    provider: SttProvider::Deepgram,
                })
            }
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpeech`] when the service recognized nothing, and
    /// [`Error::Stt`] for transport or API failures
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(Error::NoSpeech);
        }

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> ApiKeys {
        ApiKeys {
            openai: Some("sk-test".to_string()),
            deepgram: Some("dg-test".to_string()),
            elevenlabs: None,
        }
    }

    #[test]
    fn test_from_config_whisper() {
        let voice = VoiceConfig::default();
        assert!(SpeechToText::from_config(&voice, &keys()).is_ok());
    }

    #[test]
    fn test_from_config_missing_key() {
        let voice = VoiceConfig::default();
        let no_keys = ApiKeys::default();
        assert!(matches!(
            SpeechToText::from_config(&voice, &no_keys),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let voice = VoiceConfig {
            stt_provider: "telepathy".to_string(),
            ..VoiceConfig::default()
        };
        assert!(matches!(
            SpeechToText::from_config(&voice, &keys()),
            Err(Error::Config(_))
        ));
    }
}
