//! # Transcription Adapter
//!
//! Turns an uploaded audio payload into a `TranscriptionResult`.
//!
//! ## Process:
//! 1. Read the WAV header and check its format and duration
//! 2. Decode into a mono clip at the configured rate
//! 3. Validate duration and signal level
//! 4. Condition the clip (DC offset, peak normalisation)
//! 5. One gated, time-limited call into the recognizer
//! 6. Score confidence and format the result

use super::recognizer::SpeechRecognizer;
use crate::audio::{decode_wav, inspect_wav, AudioError, AudioLimits, AudioProcessor};
use crate::engine::{EngineError, EngineGate};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a transcription operation, serialised as the `/stt` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionResult {
    /// The transcribed text
    pub text: String,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,

    /// Duration of audio processed (seconds)
    pub duration_seconds: f64,

    /// Time taken for transcription (milliseconds)
    pub processing_time_ms: u64,

    /// Recognizer that produced the text
    pub engine: String,
}

/// Why a payload could not be transcribed.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// Zero bytes, or a WAV with zero samples
    EmptyAudio,
    /// Not a decodable WAV
    UnreadableAudio(AudioError),
    AudioTooShort { duration_secs: f64, min_secs: f64 },
    AudioTooLong { duration_secs: f64, max_secs: f64 },
    Silent { peak: f32 },
    /// The recognizer failed, was unreachable or timed out
    Engine(EngineError),
}

impl fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionError::EmptyAudio => write!(f, "audio upload is empty"),
            TranscriptionError::UnreadableAudio(err) => write!(f, "unreadable audio: {}", err),
            TranscriptionError::AudioTooShort { duration_secs, min_secs } => write!(
                f,
                "audio too short: {:.2}s (minimum: {:.2}s)",
                duration_secs, min_secs
            ),
            TranscriptionError::AudioTooLong { duration_secs, max_secs } => write!(
                f,
                "audio too long: {:.2}s (maximum: {:.2}s)",
                duration_secs, max_secs
            ),
            TranscriptionError::Silent { peak } => {
                write!(f, "audio contains no speech (peak amplitude {:.5})", peak)
            }
            TranscriptionError::Engine(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for TranscriptionError {}

impl From<AudioError> for TranscriptionError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Empty => TranscriptionError::EmptyAudio,
            AudioError::TooShort { duration_secs, min_secs } => {
                TranscriptionError::AudioTooShort { duration_secs, min_secs }
            }
            AudioError::TooLong { duration_secs, max_secs } => {
                TranscriptionError::AudioTooLong { duration_secs, max_secs }
            }
            AudioError::Silent { peak } => TranscriptionError::Silent { peak },
            other => TranscriptionError::UnreadableAudio(other),
        }
    }
}

impl From<EngineError> for TranscriptionError {
    fn from(err: EngineError) -> Self {
        TranscriptionError::Engine(err)
    }
}

/// Speech-to-text front end for one recognizer.
pub struct TranscriptionAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    gate: EngineGate,
    sample_rate: u32,
}

impl TranscriptionAdapter {
    /// ## Parameters:
    /// - **recognizer**: The speech recognition capability
    /// - **max_concurrent**: Calls allowed into the recognizer at once
    /// - **sample_rate**: Rate clips are resampled to before recognition
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, max_concurrent: usize, sample_rate: u32) -> Self {
        Self {
            gate: EngineGate::new("recognizer", max_concurrent),
            recognizer,
            sample_rate,
        }
    }

    pub fn engine_name(&self) -> &str {
        self.recognizer.name()
    }

    pub fn gate(&self) -> &EngineGate {
        &self.gate
    }

    /// Transcribe one uploaded audio payload.
    ///
    /// Never returns a placeholder: an empty or unreadable upload is an error.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        timeout: Duration,
        limits: &AudioLimits,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let start_time = Instant::now();

        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let processor = AudioProcessor::new(limits.clone());
        let summary = inspect_wav(audio)?;
        if summary.frames == 0 {
            return Err(TranscriptionError::EmptyAudio);
        }
        processor.check_duration(summary.duration_secs())?;

        let clip = decode_wav(audio, self.sample_rate)?;
        processor.validate(&clip)?;
        let clip = processor.preprocess(clip);
        let duration_seconds = clip.duration_secs();

        tracing::debug!(
            engine = self.recognizer.name(),
            "Starting transcription of {:.2}s audio",
            duration_seconds
        );

        let recognition = self
            .gate
            .run(timeout, self.recognizer.recognize(&clip))
            .await?;

        let text = recognition.text.trim().to_string();
        let confidence = match recognition.confidence {
            Some(reported) if reported.is_finite() => reported.clamp(0.0, 1.0),
            _ => estimate_confidence(&text, duration_seconds),
        };
        let processing_time_ms = start_time.elapsed().as_millis() as u64;

        tracing::info!(
            "Transcription completed: {:.2}s audio -> {} chars in {}ms (confidence: {:.2})",
            duration_seconds,
            text.len(),
            processing_time_ms,
            confidence
        );

        Ok(TranscriptionResult {
            text,
            confidence,
            duration_seconds,
            processing_time_ms,
            engine: self.recognizer.name().to_string(),
        })
    }
}

/// Estimate confidence for a transcript when the engine reports none.
///
/// ## Heuristic Approach:
/// Speaking pace, common-word presence, capitalisation, punctuation and
/// obvious garbling each nudge a 0.5 baseline.
pub fn estimate_confidence(text: &str, audio_duration: f64) -> f32 {
    if text.trim().is_empty() {
        return 0.2;
    }

    let mut confidence = 0.5f32;

    // Factor 1: Text length vs audio duration ratio
    let chars_per_second = if audio_duration > 0.0 {
        text.len() as f64 / audio_duration
    } else {
        0.0
    };
    if chars_per_second > 10.0 && chars_per_second < 100.0 {
        confidence += 0.2;
    } else {
        confidence -= 0.1;
    }

    // Factor 2: Presence of common words
    let common_words = ["the", "and", "to", "of", "a", "in", "is", "it", "you", "that"];
    let text_lower = text.to_lowercase();
    let words: Vec<&str> = text_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    let common_word_count = common_words
        .iter()
        .filter(|&&word| words.contains(&word))
        .count();
    if common_word_count > 0 {
        confidence += 0.1 * (common_word_count as f32 / common_words.len() as f32);
    }

    // Factor 3: Capitalisation and single punctuation marks
    if text.chars().next().map_or(false, |c| c.is_uppercase()) {
        confidence += 0.1;
    }
    if (text.contains('.') && !text.contains(".."))
        || (text.contains('?') && !text.contains("??"))
        || (text.contains('!') && !text.contains("!!"))
    {
        confidence += 0.1;
    }

    // Factor 4: Garbled output
    if text.contains("...") || text.contains("???") || text.contains("asd") {
        confidence -= 0.2;
    } else {
        confidence += 0.1;
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sine_wav, FakeRecognizer};

    fn adapter(recognizer: FakeRecognizer) -> TranscriptionAdapter {
        TranscriptionAdapter::new(Arc::new(recognizer), 1, 16000)
    }

    #[test]
    fn test_confidence_estimation() {
        assert!(estimate_confidence("Hello, how are you today?", 2.0) > 0.5);
        assert!(estimate_confidence("", 2.0) < 0.5);
        assert!(estimate_confidence("asdkjhasd... ???", 2.0) < 0.5);
        assert!(estimate_confidence("Hello there.", 0.0) <= 1.0);
    }

    #[tokio::test]
    async fn test_transcribes_wav_upload() {
        let adapter = adapter(FakeRecognizer::text("  I led the migration to Rust.  "));
        let result = adapter
            .transcribe(&sine_wav(1.0), Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap();

        assert_eq!(result.text, "I led the migration to Rust.");
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!((result.duration_seconds - 1.0).abs() < 0.01);
        assert_eq!(result.engine, "fake");
    }

    #[tokio::test]
    async fn test_engine_confidence_is_clamped() {
        let recognizer = FakeRecognizer::text("hello").with_confidence(Some(1.7));
        let result = adapter(recognizer)
            .transcribe(&sine_wav(0.5), Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap();
        assert_eq!(result.confidence, 1.0);

        let recognizer = FakeRecognizer::text("hello").with_confidence(Some(f32::NAN));
        let result = adapter(recognizer)
            .transcribe(&sine_wav(0.5), Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected_before_engine() {
        let recognizer = FakeRecognizer::text("should never be seen");
        let calls = recognizer.calls();
        let err = adapter(recognizer)
            .transcribe(&[], Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap_err();

        assert_eq!(err, TranscriptionError::EmptyAudio);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_wav_upload_is_unreadable() {
        let err = adapter(FakeRecognizer::text("x"))
            .transcribe(b"not audio at all", Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::UnreadableAudio(AudioError::NotWav(_))));
    }

    #[tokio::test]
    async fn test_duration_bounds() {
        let limits = AudioLimits {
            min_duration_secs: 0.5,
            max_duration_secs: 1.0,
            silence_threshold: 0.001,
        };
        let adapter = adapter(FakeRecognizer::text("x"));

        let short = adapter
            .transcribe(&sine_wav(0.2), Duration::from_secs(1), &limits)
            .await
            .unwrap_err();
        assert!(matches!(short, TranscriptionError::AudioTooShort { .. }));

        let long = adapter
            .transcribe(&sine_wav(2.0), Duration::from_secs(1), &limits)
            .await
            .unwrap_err();
        assert!(matches!(long, TranscriptionError::AudioTooLong { .. }));
    }

    #[test]
    fn test_common_words_match_whole_words_only() {
        // "a" inside a longer word is not a common word
        assert_eq!(estimate_confidence("Banana", 1.0), estimate_confidence("Bxnxnx", 1.0));
        assert!(estimate_confidence("The banana", 1.0) > estimate_confidence("Xyz banana", 1.0));
    }

    #[tokio::test]
    async fn test_header_duration_is_checked_before_decoding() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..3000 {
                writer.write_sample(((i % 40) as i16 - 20) * 500).unwrap();
            }
            writer.finalize().unwrap();
        }
        let limits = AudioLimits {
            min_duration_secs: 0.1,
            max_duration_secs: 1.0,
            silence_threshold: 0.001,
        };

        let recognizer = FakeRecognizer::text("x");
        let calls = recognizer.calls();
        let err = adapter(recognizer)
            .transcribe(&cursor.into_inner(), Duration::from_secs(1), &limits)
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::AudioTooLong { .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_hertz_upload_is_unreadable() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..4000 {
                writer.write_sample(((i % 50) as i8) - 25).unwrap();
            }
            writer.finalize().unwrap();
        }

        let err = adapter(FakeRecognizer::text("x"))
            .transcribe(&cursor.into_inner(), Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::UnreadableAudio(AudioError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_silence_is_rejected() {
        let silent = crate::audio::encode_wav(&crate::audio::AudioClip::new(vec![0.0; 8000], 16000))
            .unwrap();
        let err = adapter(FakeRecognizer::text("x"))
            .transcribe(&silent, Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Silent { .. }));
    }

    #[tokio::test]
    async fn test_slow_recognizer_times_out() {
        let recognizer = FakeRecognizer::text("late").with_delay(Duration::from_secs(5));
        let err = adapter(recognizer)
            .transcribe(&sine_wav(0.5), Duration::from_millis(20), &AudioLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Engine(EngineError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_engine_failure_is_propagated() {
        let recognizer = FakeRecognizer::failing(EngineError::Failed("model crashed".into()));
        let err = adapter(recognizer)
            .transcribe(&sine_wav(0.5), Duration::from_secs(1), &AudioLimits::default())
            .await
            .unwrap_err();
        assert_eq!(err, TranscriptionError::Engine(EngineError::Failed("model crashed".into())));
    }
}
