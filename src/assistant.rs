//! The assistant - the main orchestration loop
//!
//! Wires capture, utterance detection, STT, the model registry, TTS, and
//! the panel together: listen, transcribe, infer, speak, repeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::catalog::ModelCatalog;
use crate::llm::ModelRegistry;
use crate::panel::{self, PanelState, SharedPanel};
use crate::voice::{
    AudioCapture, AudioPlayback, ListenOutcome, SAMPLE_RATE, SpeechToText, TextToSpeech,
    UtteranceDetector, samples_to_wav,
};
use crate::{Config, Error, Result};

/// Interval between polls of the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to sample ambient noise before listening starts
const CALIBRATION_WINDOW: Duration = Duration::from_millis(500);

/// The assistant - owns the model registry and the listening loop
pub struct Assistant {
    config: Config,
    catalog: ModelCatalog,
    registry: ModelRegistry,
    panel: SharedPanel,
}

impl Assistant {
    /// Create a new assistant
    ///
    /// # Errors
    ///
    /// Returns error if the models directory cannot be created
    pub fn new(config: Config) -> Result<Self> {
        let catalog = ModelCatalog::new(&config.models_dir)?;
        let registry = ModelRegistry::new(config.llm.clone());
        let panel = PanelState::new(
            catalog.clone(),
            registry.clone(),
            config.voice.enabled,
            config.panel.static_dir.clone(),
        );

        Ok(Self {
            config,
            catalog,
            registry,
            panel,
        })
    }

    /// The model catalog
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// The model registry handle
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Run until interrupted
    ///
    /// Serves the panel, auto-loads the first catalog entry, and runs the
    /// listening loop on this task (cpal streams aren't `Send`).
    ///
    /// # Errors
    ///
    /// Returns error if startup fails; per-iteration errors are logged and
    /// retried
    pub async fn run(self) -> Result<()> {
        // Panel server
        {
            let panel = Arc::clone(&self.panel);
            let port = self.config.panel.port;
            tokio::spawn(async move {
                if let Err(e) = panel::serve(panel, port).await {
                    tracing::error!(error = %e, "panel server stopped");
                }
            });
        }

        // Load the first model in the catalog, if any
        match self.catalog.list().first() {
            Some(first) => match self.catalog.path_of(first) {
                Ok(path) => self.registry.select(first.clone(), path).await,
                Err(e) => tracing::warn!(file = %first, error = %e, "initial model unavailable"),
            },
            None => tracing::warn!(
                dir = %self.catalog.dir().display(),
                "no model files found, replies degrade until one is added and selected"
            ),
        }

        // Shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        if self.config.voice.enabled {
            self.run_listen_loop(&mut shutdown_rx).await?;
        } else {
            tracing::info!("voice disabled, panel-only mode");
            shutdown_rx.recv().await;
        }

        tracing::info!("assistant stopped");
        Ok(())
    }

    /// The listening loop: capture, detect, transcribe, infer, speak
    async fn run_listen_loop(&self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        let stt = SpeechToText::from_config(&self.config.voice, &self.config.api_keys)?;
        let tts = TextToSpeech::from_config(&self.config.voice, &self.config.api_keys)?;
        let mut playback = AudioPlayback::new()?;
        let mut capture = AudioCapture::new()?;
        let mut detector =
            UtteranceDetector::new(SAMPLE_RATE, self.config.voice.listen_timeout_secs);

        capture.start()?;

        // Calibrate against the room before treating anything as speech
        tokio::time::sleep(CALIBRATION_WINDOW).await;
        detector.calibrate(&capture.take_buffer());

        tracing::info!("listening for speech");
        self.panel.notify_listening();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(POLL_INTERVAL) => {
                    if let Err(e) = self
                        .process_chunk(&capture, &mut detector, &stt, &tts, &mut playback)
                        .await
                    {
                        tracing::error!(error = %e, "listening loop error");
                    }
                }
            }
        }

        capture.stop();
        Ok(())
    }

    /// Feed one capture chunk through the detector and handle outcomes
    async fn process_chunk(
        &self,
        capture: &AudioCapture,
        detector: &mut UtteranceDetector,
        stt: &SpeechToText,
        tts: &TextToSpeech,
        playback: &mut AudioPlayback,
    ) -> Result<()> {
        let samples = capture.take_buffer();
        if samples.is_empty() {
            return Ok(());
        }

        match detector.push(&samples) {
            None => Ok(()),
            Some(ListenOutcome::Timeout) => {
                // Quiet room; keep waiting
                tracing::trace!("listen timeout, retrying");
                Ok(())
            }
            Some(ListenOutcome::Utterance(utterance)) => {
                self.handle_utterance(utterance, capture, detector, stt, tts, playback)
                    .await
            }
        }
    }

    /// Transcribe an utterance, generate a reply, show and speak it
    async fn handle_utterance(
        &self,
        utterance: Vec<f32>,
        capture: &AudioCapture,
        detector: &mut UtteranceDetector,
        stt: &SpeechToText,
        tts: &TextToSpeech,
        playback: &mut AudioPlayback,
    ) -> Result<()> {
        let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;

        let transcript = match stt.transcribe(&wav).await {
            Ok(text) => text,
            Err(Error::NoSpeech) => {
                tracing::debug!("could not understand audio, retrying");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(transcript = %transcript, "you said");
        self.panel.notify_transcript(&transcript);

        let reply = self.registry.reply(&transcript).await?;
        tracing::info!(reply = %reply, "assistant");
        self.panel.record_exchange(&transcript, &reply).await;

        self.speak(tts, playback, &reply).await?;

        // Don't listen to our own voice
        capture.clear_buffer();
        detector.reset();
        self.panel.notify_listening();

        Ok(())
    }

    /// Synthesize and play a reply
    async fn speak(
        &self,
        tts: &TextToSpeech,
        playback: &mut AudioPlayback,
        text: &str,
    ) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        tracing::debug!(text, "speaking");
        let audio = tts.synthesize(text).await?;
        playback.play_mp3(&audio)
    }
}
