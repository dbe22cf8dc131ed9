//! Utterance detection
//!
//! Energy-based voice activity detection over the capture buffer. The
//! detector is calibrated against ambient room noise, waits for speech up
//! to a listen timeout, and yields the accumulated samples once the
//! speaker falls silent.

/// Base energy threshold to consider speech, before calibration
const BASE_ENERGY_THRESHOLD: f32 = 0.03;

/// Calibrated threshold is the noise floor times this factor
const NOISE_FLOOR_FACTOR: f32 = 1.5;

/// Minimum duration of speech for a valid utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration marking the end of an utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Waiting for speech to start
    Idle,
    /// Speech detected, accumulating the utterance
    Capturing,
}

/// Outcome of feeding samples to the detector
#[derive(Debug, Clone, PartialEq)]
pub enum ListenOutcome {
    /// A complete utterance was captured
    Utterance(Vec<f32>),
    /// No speech started within the listen window
    Timeout,
}

/// Detects spoken utterances in a stream of audio chunks
pub struct UtteranceDetector {
    state: ListenerState,
    threshold: f32,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    waited_samples: usize,
    timeout_samples: usize,
}

impl UtteranceDetector {
    /// Create a detector with the given listen timeout
    #[must_use]
    pub fn new(sample_rate: u32, timeout_secs: f32) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let timeout_samples = (sample_rate as f32 * timeout_secs.max(0.0)) as usize;

        Self {
            state: ListenerState::Idle,
            threshold: BASE_ENERGY_THRESHOLD,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            waited_samples: 0,
            timeout_samples,
        }
    }

    /// Calibrate the speech threshold against ambient room noise
    ///
    /// The threshold never drops below the uncalibrated base, so a silent
    /// room doesn't make the detector hair-triggered.
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let noise_floor = rms_energy(ambient);
        self.threshold = (noise_floor * NOISE_FLOOR_FACTOR).max(BASE_ENERGY_THRESHOLD);
        tracing::debug!(
            noise_floor,
            threshold = self.threshold,
            "calibrated for ambient noise"
        );
    }

    /// Feed a chunk of captured samples
    ///
    /// Returns an outcome when an utterance completes or the listen window
    /// expires without speech; otherwise the detector keeps accumulating.
    pub fn push(&mut self, samples: &[f32]) -> Option<ListenOutcome> {
        let energy = rms_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            ListenerState::Idle => {
                if is_speech {
                    self.state = ListenerState::Capturing;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    self.waited_samples = 0;
                    tracing::trace!(energy, "speech detected");
                    return None;
                }

                self.waited_samples += samples.len();
                if self.waited_samples >= self.timeout_samples {
                    self.waited_samples = 0;
                    tracing::trace!("listen window expired");
                    return Some(ListenOutcome::Timeout);
                }
            }
            ListenerState::Capturing => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.speech_buffer.len(),
                    silence = self.silence_counter,
                    energy,
                    "capturing"
                );

                if self.silence_counter > SILENCE_SAMPLES {
                    // The buffer carries the trailing silence; only what came
                    // before it counts as speech
                    let voiced = self.speech_buffer.len().saturating_sub(self.silence_counter);
                    if voiced > MIN_SPEECH_SAMPLES {
                        tracing::debug!(
                            samples = self.speech_buffer.len(),
                            voiced,
                            "utterance complete"
                        );
                        let utterance = std::mem::take(&mut self.speech_buffer);
                        self.reset();
                        return Some(ListenOutcome::Utterance(utterance));
                    }

                    // Too short to be speech, a cough or a door slam
                    tracing::trace!("discarding short noise burst");
                    self.reset();
                }
            }
        }

        None
    }

    /// Reset to idle, discarding any partial capture
    pub fn reset(&mut self) {
        self.state = ListenerState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
        self.waited_samples = 0;
    }

    /// Current detector state
    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    /// The calibrated speech threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms_energy(&loud) > 0.4);
    }

    #[test]
    fn test_calibration_raises_threshold() {
        let mut detector = UtteranceDetector::new(16000, 5.0);
        let base = detector.threshold();

        let noisy_room = vec![0.1f32; 1600];
        detector.calibrate(&noisy_room);
        assert!(detector.threshold() > base);
    }

    #[test]
    fn test_calibration_keeps_base_floor_in_silent_room() {
        let mut detector = UtteranceDetector::new(16000, 5.0);
        detector.calibrate(&vec![0.0f32; 1600]);
        assert!((detector.threshold() - BASE_ENERGY_THRESHOLD).abs() < f32::EPSILON);
    }

    #[test]
    fn test_timeout_without_speech() {
        let mut detector = UtteranceDetector::new(16000, 0.5);

        // 0.4 seconds of silence: still waiting
        assert_eq!(detector.push(&vec![0.0f32; 6400]), None);

        // Crossing 0.5 seconds: timeout
        assert_eq!(
            detector.push(&vec![0.0f32; 6400]),
            Some(ListenOutcome::Timeout)
        );
        assert_eq!(detector.state(), ListenerState::Idle);
    }
}
