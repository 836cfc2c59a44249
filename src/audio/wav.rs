//! WAV container decoding and encoding.

use super::processor::{float_to_pcm16, mix_to_mono, resample};
use super::{AudioClip, AudioError};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;

/// Size of the RIFF header: "RIFF" + chunk size + "WAVE".
const RIFF_HEADER_LEN: usize = 12;

/// Source sample rates accepted from uploads.
pub const SOURCE_RATES_HZ: std::ops::RangeInclusive<u32> = 1_000..=384_000;

/// Format details of a WAV payload, read without decoding every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
}

impl WavSummary {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Check the RIFF/WAVE signature before handing bytes to the decoder.
///
/// Gives a clear "this is not a WAV" error for MP3/WebM/text uploads instead
/// of a generic decoder message.
fn check_riff_header(bytes: &[u8]) -> Result<(), AudioError> {
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }

    if bytes.len() < RIFF_HEADER_LEN {
        return Err(AudioError::NotWav(format!(
            "{} bytes is shorter than a RIFF header",
            bytes.len()
        )));
    }

    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioError::NotWav("missing RIFF/WAVE signature".to_string()));
    }

    // Streaming writers often leave the size at 0 or u32::MAX; only note it.
    let declared = LittleEndian::read_u32(&bytes[4..8]) as usize;
    if declared.saturating_add(8) != bytes.len() {
        tracing::debug!(
            declared_bytes = declared + 8,
            actual_bytes = bytes.len(),
            "RIFF chunk size does not match payload length"
        );
    }

    Ok(())
}

/// Reject headers whose layout would make decoding meaningless or unbounded.
///
/// Resampling multiplies the sample count by `target / source`, so the source
/// rate is capped from below before any sample is read.
fn check_format(spec: &hound::WavSpec) -> Result<(), AudioError> {
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(AudioError::Decode(format!(
            "invalid header: {} channels at {} Hz",
            spec.channels, spec.sample_rate
        )));
    }

    if !SOURCE_RATES_HZ.contains(&spec.sample_rate) {
        return Err(AudioError::UnsupportedFormat(format!(
            "sample rate {} Hz (expected {} to {} Hz)",
            spec.sample_rate,
            SOURCE_RATES_HZ.start(),
            SOURCE_RATES_HZ.end()
        )));
    }

    Ok(())
}

/// Read the format of a WAV payload from its header, without decoding samples.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavSummary, AudioError> {
    check_riff_header(bytes)?;
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    check_format(&spec)?;

    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Decode WAV bytes into a mono clip at `target_rate`.
///
/// Integer samples are scaled by their bit depth, multi-channel audio is
/// averaged down to mono, and the result is linearly resampled.
pub fn decode_wav(bytes: &[u8], target_rate: u32) -> Result<AudioClip, AudioError> {
    check_riff_header(bytes)?;

    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    check_format(&spec)?;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{}-bit integer samples",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }

    let mono = mix_to_mono(&samples, spec.channels as usize);
    let resampled = if spec.sample_rate != target_rate {
        resample(&mono, spec.sample_rate, target_rate)
    } else {
        mono
    };

    tracing::debug!(
        source_rate = spec.sample_rate,
        source_channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = resampled.len(),
        "Decoded WAV upload"
    );

    Ok(AudioClip::new(resampled, target_rate))
}

/// Encode a clip as 16-bit mono PCM WAV.
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::Encode(e.to_string()))?;
        for sample in float_to_pcm16(&clip.samples) {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Encode(e.to_string()))?;
        }
        writer.finalize().map_err(|e| AudioError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
