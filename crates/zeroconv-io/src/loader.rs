//! [`IrLoader`] backed by WAV files on disk.

use std::path::{Path, PathBuf};

use zeroconv_core::{ConvolverError, IrLoader, SampleBuffer};

use crate::resample::resample;
use crate::wav::read_ir;

/// Loads impulse responses from WAV files and resamples them to the target rate.
///
/// Relative paths are resolved against an optional base directory, so a
/// preset can refer to `"irs/hall.wav"` independent of the working directory.
#[derive(Debug, Clone, Default)]
pub struct WavLoader {
    base_dir: Option<PathBuf>,
}

impl WavLoader {
    /// Loader resolving paths as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader resolving relative paths against `dir`.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    /// Base directory for relative paths, if any.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn load_channels(&self, path: &str, target_rate: u32) -> crate::Result<Vec<Vec<f32>>> {
        let resolved = self.resolve(path);
        let (channels, rate) = read_ir(&resolved)?;
        tracing::debug!(
            "ir_load: {} ({} ch, {} frames at {rate} Hz)",
            resolved.display(),
            channels.len(),
            channels.first().map_or(0, Vec::len)
        );
        if rate == target_rate {
            return Ok(channels);
        }
        let converted = resample(&channels, rate, target_rate)?;
        tracing::info!("ir_load: resampled {} from {rate} Hz to {target_rate} Hz", resolved.display());
        Ok(converted)
    }
}

impl IrLoader for WavLoader {
    fn load(&self, path: &str, target_rate: u32) -> Result<Vec<SampleBuffer>, ConvolverError> {
        let channels = self
            .load_channels(path, target_rate)
            .map_err(|e| ConvolverError::load(path, e.to_string()))?;
        Ok(channels
            .into_iter()
            .map(|samples| SampleBuffer::new(samples, target_rate))
            .collect())
    }
}
