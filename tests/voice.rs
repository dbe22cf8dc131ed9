//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use murmur::voice::{ListenOutcome, ListenerState, SAMPLE_RATE, UtteranceDetector, samples_to_wav};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_detector_starts_idle() {
    let detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);
    assert_eq!(detector.state(), ListenerState::Idle);
}

#[test]
fn test_silence_does_not_trigger_capture() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    let silence = generate_silence(0.1);
    assert_eq!(detector.push(&silence), None);
    assert_eq!(detector.state(), ListenerState::Idle);
}

#[test]
fn test_speech_starts_capture() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    assert_eq!(detector.push(&speech), None);
    assert_eq!(detector.state(), ListenerState::Capturing);
}

#[test]
fn test_utterance_completes_after_silence() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    detector.push(&speech);

    let silence = generate_silence(0.6);
    let outcome = detector.push(&silence);

    let Some(ListenOutcome::Utterance(samples)) = outcome else {
        panic!("expected a complete utterance, got {outcome:?}");
    };
    assert_eq!(samples.len(), speech.len() + silence.len());
    assert_eq!(detector.state(), ListenerState::Idle);
}

#[test]
fn test_short_noise_burst_is_discarded() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    // A 0.1 second blip is below the minimum speech duration
    let blip = generate_sine_samples(440.0, 0.1, 0.3);
    detector.push(&blip);
    assert_eq!(detector.state(), ListenerState::Capturing);

    let silence = generate_silence(0.6);
    assert_eq!(detector.push(&silence), None);
    assert_eq!(detector.state(), ListenerState::Idle);
}

#[test]
fn test_listen_timeout_in_quiet_room() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 1.0);

    // Under the window: still waiting
    assert_eq!(detector.push(&generate_silence(0.5)), None);

    // Crossing it: timeout
    assert_eq!(
        detector.push(&generate_silence(0.6)),
        Some(ListenOutcome::Timeout)
    );

    // The window restarts after a timeout
    assert_eq!(detector.push(&generate_silence(0.5)), None);
    assert_eq!(
        detector.push(&generate_silence(0.6)),
        Some(ListenOutcome::Timeout)
    );
}

#[test]
fn test_speech_after_timeout_still_detected() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 1.0);

    assert_eq!(
        detector.push(&generate_silence(1.1)),
        Some(ListenOutcome::Timeout)
    );

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    detector.push(&speech);
    assert_eq!(detector.state(), ListenerState::Capturing);

    let outcome = detector.push(&generate_silence(0.6));
    assert!(matches!(outcome, Some(ListenOutcome::Utterance(_))));
}

#[test]
fn test_calibration_ignores_calibrated_noise_level() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    // Calibrate against a noisy room
    let room_noise = generate_sine_samples(100.0, 0.5, 0.1);
    detector.calibrate(&room_noise);

    // The same noise level no longer reads as speech
    assert_eq!(detector.push(&room_noise), None);
    assert_eq!(detector.state(), ListenerState::Idle);

    // Clearly louder audio still does
    let speech = generate_sine_samples(440.0, 0.5, 0.5);
    detector.push(&speech);
    assert_eq!(detector.state(), ListenerState::Capturing);
}

#[test]
fn test_reset_discards_partial_capture() {
    let mut detector = UtteranceDetector::new(SAMPLE_RATE, 5.0);

    let speech = generate_sine_samples(440.0, 0.5, 0.3);
    detector.push(&speech);
    assert_eq!(detector.state(), ListenerState::Capturing);

    detector.reset();
    assert_eq!(detector.state(), ListenerState::Idle);

    // Nothing left over: completing silence yields no utterance
    assert_eq!(detector.push(&generate_silence(0.6)), None);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    // Read samples back
    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
}
