//! Encoding of raw f32 samples into the container formats jobs can ask for.

use std::io::Cursor;

use crate::{AudioFormat, AudioResult};

/// Encode mono f32 samples as `format`.
///
/// - `wav`: 16-bit PCM WAV
/// - `pcm`: headerless 16-bit little-endian samples
/// - `mp3`: no encoder is bundled, so this falls back to WAV and the returned
///   [`AudioResult::format`] says so.
pub fn encode_samples(
    samples: &[f32],
    sample_rate: u32,
    format: AudioFormat,
) -> Result<AudioResult, hound::Error> {
    match format {
        AudioFormat::Pcm => Ok(AudioResult {
            bytes: samples
                .iter()
                .flat_map(|&sample| to_i16(sample).to_le_bytes())
                .collect(),
            format: AudioFormat::Pcm,
        }),
        AudioFormat::Wav => Ok(AudioResult {
            bytes: write_wav(samples, sample_rate)?,
            format: AudioFormat::Wav,
        }),
        AudioFormat::Mp3 => {
            log::warn!("MP3 encoding is not available, returning WAV instead");
            Ok(AudioResult {
                bytes: write_wav(samples, sample_rate)?,
                format: AudioFormat::Wav,
            })
        }
    }
}

/// Duration of `sample_count` mono samples in seconds.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}

fn write_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
