//! Multi-channel WAV reading and writing for impulse responses.
//!
//! Unlike playback audio, impulse responses keep every channel separate:
//! channel `k` of the file becomes IR channel `k` of the routing matrix.

use crate::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Impulse-response file metadata, read without decoding samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrInfo {
    /// Number of channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Samples per channel.
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

/// Reads the header of an impulse-response file.
pub fn read_ir_info<P: AsRef<Path>>(path: P) -> Result<IrInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = u64::from(reader.duration());
    Ok(IrInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs: num_frames as f64 / f64::from(spec.sample_rate),
    })
}

/// Reads every channel of a WAV file as normalized `f32`.
///
/// Returns one `Vec` per channel plus the file's sample rate.
///
/// # Example
/// ```ignore
/// let (channels, rate) = read_ir("hall.wav")?;
/// println!("{} channels x {} frames at {rate} Hz", channels.len(), channels[0].len());
/// ```
pub fn read_ir<P: AsRef<Path>>(path: P) -> Result<(Vec<Vec<f32>>, u32)> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(Error::UnsupportedFormat("zero channels".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(Error::UnsupportedFormat(format!(
                    "{}-bit integer PCM",
                    spec.bits_per_sample
                )));
            }
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let frames = interleaved.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (channel, &sample) in out.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    Ok((out, spec.sample_rate))
}

/// Writes per-channel sample buffers as an interleaved WAV file.
///
/// `bits_per_sample == 32` writes IEEE float, anything else integer PCM.
/// Shorter channels are padded with silence.
pub fn write_ir<P: AsRef<Path>>(
    path: P,
    channels: &[Vec<f32>],
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<()> {
    let n_channels = u16::try_from(channels.len())
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::UnsupportedFormat(format!("{} channels", channels.len())))?;
    let spec = WavSpec {
        channels: n_channels,
        sample_rate,
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };
    let mut writer = WavWriter::create(path, spec)?;

    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    let max_val = (1i64 << (bits_per_sample.clamp(1, 32) - 1)) as f32;
    for i in 0..frames {
        for channel in channels {
            let sample = channel.get(i).copied().unwrap_or(0.0);
            if bits_per_sample == 32 {
                writer.write_sample(sample)?;
            } else {
                let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
                writer.write_sample(int_sample)?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}
