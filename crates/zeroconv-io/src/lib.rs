//! Impulse-response I/O for zeroconv.
//!
//! This crate provides the blocking, configuration-side collaborators of
//! [`zeroconv_core::Convolver`]:
//!
//! - **WAV decoding**: [`read_ir`] and [`read_ir_info`] load multi-channel
//!   impulse responses, one buffer per channel
//! - **Resampling**: [`resample`] converts IRs to the processing rate with `rubato`
//! - **Loader**: [`WavLoader`] implements [`zeroconv_core::IrLoader`] on top of both
//! - **Presets**: [`IrPreset`] bundles an IR path, channel layout and settings in TOML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zeroconv_io::{IrPreset, WavLoader};
//!
//! let preset = IrPreset::load("presets/hall.toml")?;
//! let mut convolver = preset.convolver(48000, Arc::new(WavLoader::new()));
//! convolver.reconfigure(512, true)?;
//! ```

mod loader;
mod preset;
mod resample;
mod wav;

pub use loader::WavLoader;
pub use preset::IrPreset;
pub use resample::resample;
pub use wav::{IrInfo, read_ir, read_ir_info, write_ir};

use std::path::PathBuf;

/// Error types for impulse-response I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// A file could not be read or written.
    #[error("failed to access '{path}': {source}")]
    File {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Sample-rate conversion failed.
    #[error("resampling failed: {0}")]
    Resample(String),

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The file's sample layout cannot be used as an impulse response.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for impulse-response I/O.
pub type Result<T> = std::result::Result<T, Error>;
