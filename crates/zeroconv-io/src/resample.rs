//! Sample-rate conversion of impulse responses.

use crate::{Error, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const SINC_LEN: usize = 256;

/// Converts every channel from `from_rate` to `to_rate`.
///
/// The whole IR is processed in one pass and the filter delay is removed,
/// so the onset stays at frame 0. Output length is
/// `ceil(len * to_rate / from_rate)`.
pub fn resample(channels: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    if from_rate == to_rate {
        return Ok(channels.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(Error::Resample(format!("invalid rates {from_rate} -> {to_rate}")));
    }
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    if frames == 0 || channels.is_empty() {
        return Ok(vec![Vec::new(); channels.len()]);
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    // Trailing silence lets the filter ring out past its own delay.
    let chunk = frames + SINC_LEN;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, channels.len())
        .map_err(|e| Error::Resample(format!("init: {e}")))?;

    let input: Vec<Vec<f32>> = channels
        .iter()
        .map(|c| {
            let mut padded = c.clone();
            padded.resize(chunk, 0.0);
            padded
        })
        .collect();
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| Error::Resample(e.to_string()))?;
    let flushed = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| Error::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let target = (frames as u64 * u64::from(to_rate)).div_ceil(u64::from(from_rate)) as usize;
    for (channel, tail) in output.iter_mut().zip(flushed) {
        channel.extend(tail);
        channel.drain(..delay.min(channel.len()));
        channel.resize(target, 0.0);
    }
    tracing::debug!("resampled {} ch: {frames} -> {target} frames", channels.len());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let ir = vec![vec![1.0, 0.5, 0.25]];
        assert_eq!(resample(&ir, 48000, 48000).unwrap(), ir);
    }

    #[test]
    fn test_length_follows_ratio() {
        let ir = vec![vec![0.0; 441], vec![0.0; 441]];
        let out = resample(&ir, 44100, 48000).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 480);
        assert_eq!(out[1].len(), 480);
    }

    #[test]
    fn test_onset_preserved() {
        let mut ir = vec![0.0; 2000];
        ir[100] = 1.0;
        let out = resample(&[ir], 24000, 48000).unwrap();
        let peak = out[0]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((198..=202).contains(&peak), "peak at {peak}");
    }

    #[test]
    fn test_dc_level_kept() {
        let ir = vec![vec![0.5; 4000]];
        let out = resample(&ir, 48000, 44100).unwrap();
        let mid = &out[0][1000..2500];
        assert!(mid.iter().all(|s| (s - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            resample(&[vec![1.0]], 0, 48000),
            Err(Error::Resample(_))
        ));
    }
}
