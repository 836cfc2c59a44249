//! # Audio Processing and Validation
//!
//! Checks and conditions decoded audio before it is handed to a recognizer.
//!
//! ## Key Functions:
//! - **Validation**: Reject empty, too short, too long or silent recordings
//! - **Preprocessing**: DC-offset removal and peak normalisation
//! - **Format conversion**: float → 16-bit PCM, channel mix-down, resampling

use super::{AudioClip, AudioError};

/// Bounds a recording must satisfy before transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioLimits {
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    /// Peak amplitude below which the clip is treated as silence
    pub silence_threshold: f32,
}

impl Default for AudioLimits {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.1,
            max_duration_secs: 300.0,
            silence_threshold: 0.001,
        }
    }
}

/// Audio validation and preprocessing for the transcription pipeline.
pub struct AudioProcessor {
    limits: AudioLimits,
}

impl AudioProcessor {
    pub fn new(limits: AudioLimits) -> Self {
        Self { limits }
    }

    /// Validate a decoded clip.
    ///
    /// ## Validation Checks:
    /// 1. **Samples present**: at least one sample
    /// 2. **Duration**: within the configured bounds
    /// 3. **Signal**: peak amplitude above the silence floor
    pub fn validate(&self, clip: &AudioClip) -> Result<(), AudioError> {
        if clip.is_empty() {
            return Err(AudioError::Empty);
        }

        self.check_duration(clip.duration_secs())?;

        let peak = clip.peak();
        if peak < self.limits.silence_threshold {
            return Err(AudioError::Silent { peak });
        }

        Ok(())
    }

    /// Check a duration against the configured bounds.
    ///
    /// Also used on the duration read from a WAV header, before any sample
    /// is decoded.
    pub fn check_duration(&self, duration_secs: f64) -> Result<(), AudioError> {
        if duration_secs < self.limits.min_duration_secs {
            return Err(AudioError::TooShort {
                duration_secs,
                min_secs: self.limits.min_duration_secs,
            });
        }

        if duration_secs > self.limits.max_duration_secs {
            return Err(AudioError::TooLong {
                duration_secs,
                max_secs: self.limits.max_duration_secs,
            });
        }

        Ok(())
    }

    /// Condition audio for recognition.
    ///
    /// ## Preprocessing Steps:
    /// 1. **Remove DC offset**: Center audio around zero
    /// 2. **Normalize volume**: Scale quiet recordings up to a consistent peak
    pub fn preprocess(&self, clip: AudioClip) -> AudioClip {
        let mut samples = clip.samples;

        let dc_offset = calculate_dc_offset(&samples);
        if dc_offset != 0.0 {
            for sample in &mut samples {
                *sample -= dc_offset;
            }
        }

        normalize_peak(&mut samples);

        AudioClip::new(samples, clip.sample_rate)
    }
}

/// Average sample value.
fn calculate_dc_offset(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| s as f64).sum();
    (sum / samples.len() as f64) as f32
}

/// Scale samples so the loudest one sits at `TARGET_PEAK`.
///
/// Leaves near-silent and already-loud audio alone to avoid amplifying noise
/// or clipping.
fn normalize_peak(samples: &mut [f32]) {
    const TARGET_PEAK: f32 = 0.85;

    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    if peak < 0.003 || peak > 0.9 {
        return;
    }

    let scale = TARGET_PEAK / peak;
    for sample in samples {
        *sample = (*sample * scale).clamp(-1.0, 1.0);
    }
}

/// Convert 32-bit float samples to 16-bit PCM, clamping out-of-range values.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let scaled = sample * 32768.0;
            scaled.clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

/// Average interleaved frames down to one channel.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_idx = i as f64 * ratio;
            let idx = src_idx.floor() as usize;
            let frac = src_idx.fract() as f32;

            if idx + 1 < samples.len() {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[samples.len() - 1]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_of(len: usize, value: f32) -> AudioClip {
        AudioClip::new(vec![value; len], 16000)
    }

    #[test]
    fn test_validation_bounds() {
        let processor = AudioProcessor::new(AudioLimits {
            min_duration_secs: 0.5,
            max_duration_secs: 2.0,
            silence_threshold: 0.01,
        });

        assert_eq!(processor.validate(&clip_of(0, 0.2)), Err(AudioError::Empty));
        assert!(matches!(
            processor.validate(&clip_of(1600, 0.2)),
            Err(AudioError::TooShort { .. })
        ));
        assert!(matches!(
            processor.validate(&clip_of(48000, 0.2)),
            Err(AudioError::TooLong { .. })
        ));
        assert!(matches!(
            processor.validate(&clip_of(16000, 0.0001)),
            Err(AudioError::Silent { .. })
        ));
        assert!(processor.validate(&clip_of(16000, 0.2)).is_ok());
    }

    #[test]
    fn test_preprocess_removes_dc_offset_and_normalizes() {
        let processor = AudioProcessor::new(AudioLimits::default());
        let samples: Vec<f32> = (0..1000)
            .map(|i| 0.1 + if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();

        let processed = processor.preprocess(AudioClip::new(samples, 16000));

        assert!(calculate_dc_offset(&processed.samples).abs() < 1e-4);
        assert!((processed.peak() - 0.85).abs() < 1e-3);
    }

    #[test]
    fn test_float_to_pcm_scales_and_clamps() {
        let converted = float_to_pcm16(&[0.0, 0.5, -0.5, 1.0, -1.0, 1.7, -3.0]);
        assert_eq!(converted, vec![0, 16384, -16384, 32767, -32768, 32767, -32768]);
    }

    #[test]
    fn test_mix_to_mono_averages_frames() {
        let stereo = vec![0.2, 0.4, -0.6, -0.2];
        let mono = mix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_resample_length() {
        // 48kHz -> 16kHz (3:1 ratio)
        let input: Vec<f32> = (0..48).map(|i| i as f32 / 48.0).collect();
        let output = resample(&input, 48000, 16000);
        assert_eq!(output.len(), 16);
        assert!(output.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
