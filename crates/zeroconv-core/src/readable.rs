//! Impulse-response sample providers.
//!
//! The convolver never decodes files itself. A [`IrLoader`] turns a resource
//! path into one owned [`SampleBuffer`] per IR channel, already converted to
//! the convolver's sample rate, and the convolver reads them through the
//! [`Readable`] interface while building a configuration.
//!
//! Loaded buffers are owned by the build job that requested them and are
//! dropped with it; nothing aliases them afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConvolverError;

/// Read-only access to one channel of impulse-response samples.
pub trait Readable: Send + Sync {
    /// Copies up to `dst.len()` samples starting at frame `pos` into `dst`.
    ///
    /// Returns the number of samples copied; `0` at or past the end.
    fn read(&self, dst: &mut [f32], pos: usize) -> usize;

    /// Total number of frames available.
    fn readable_length(&self) -> usize;

    /// Native sample rate of the data in Hz.
    fn sample_rate(&self) -> u32;
}

/// Owned single-channel sample data.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Wraps `samples` recorded at `sample_rate`.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// The underlying samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Pads with zeros or truncates to exactly `len` frames.
    pub fn set_length(&mut self, len: usize) {
        self.samples.resize(len, 0.0);
    }
}

impl Readable for SampleBuffer {
    fn read(&self, dst: &mut [f32], pos: usize) -> usize {
        if pos >= self.samples.len() {
            return 0;
        }
        let n = dst.len().min(self.samples.len() - pos);
        dst[..n].copy_from_slice(&self.samples[pos..pos + n]);
        n
    }

    fn readable_length(&self) -> usize {
        self.samples.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Opens impulse responses by resource path.
///
/// Called only from the configuration context; may block and perform I/O.
pub trait IrLoader: Send + Sync {
    /// Loads every channel of the IR at `path`, converted to `target_rate`.
    fn load(&self, path: &str, target_rate: u32) -> Result<Vec<SampleBuffer>, ConvolverError>;
}

/// Serves pre-decoded impulse responses registered under a path.
///
/// Useful for hosts that decode IRs themselves, and for tests. Channels are
/// returned as registered; no rate conversion is attempted.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    entries: HashMap<String, Arc<Vec<SampleBuffer>>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channels` under `path`, replacing any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, channels: Vec<SampleBuffer>) {
        self.entries.insert(path.into(), Arc::new(channels));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, path: impl Into<String>, channels: Vec<SampleBuffer>) -> Self {
        self.insert(path, channels);
        self
    }
}

impl IrLoader for MemoryLoader {
    fn load(&self, path: &str, _target_rate: u32) -> Result<Vec<SampleBuffer>, ConvolverError> {
        self.entries
            .get(path)
            .map(|channels| channels.as_ref().clone())
            .ok_or_else(|| ConvolverError::load(path, "no impulse response registered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clamps_to_length() {
        let buf = SampleBuffer::new(vec![1.0, 2.0, 3.0], 48000);
        let mut dst = [0.0; 8];
        assert_eq!(buf.read(&mut dst, 1), 2);
        assert_eq!(&dst[..2], &[2.0, 3.0]);
        assert_eq!(buf.read(&mut dst, 3), 0);
        assert_eq!(buf.read(&mut dst, 100), 0);
    }

    #[test]
    fn test_set_length_pads_and_truncates() {
        let mut buf = SampleBuffer::new(vec![1.0, 2.0], 44100);
        buf.set_length(4);
        assert_eq!(buf.samples(), &[1.0, 2.0, 0.0, 0.0]);
        buf.set_length(1);
        assert_eq!(buf.samples(), &[1.0]);
        assert_eq!(buf.sample_rate(), 44100);
    }

    #[test]
    fn test_memory_loader_unknown_path() {
        let loader = MemoryLoader::new();
        let err = loader.load("missing.wav", 48000).unwrap_err();
        assert!(matches!(err, ConvolverError::Load { .. }));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn test_memory_loader_returns_channels() {
        let loader = MemoryLoader::new().with(
            "room",
            vec![
                SampleBuffer::new(vec![1.0], 48000),
                SampleBuffer::new(vec![0.5], 48000),
            ],
        );
        let channels = loader.load("room", 48000).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].samples(), &[0.5]);
    }
}
