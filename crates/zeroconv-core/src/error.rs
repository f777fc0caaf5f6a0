//! Error types for configuration-context operations.
//!
//! Audio-context functions have no error channel; everything here is
//! produced while loading impulse responses or building a configuration.

use thiserror::Error;

use crate::routing::IrChannelConfig;

/// Errors reported by the partitioned convolution engine while configuring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Block size outside the supported range.
    #[error("unsupported engine block size {0}")]
    InvalidBlockSize(usize),

    /// More tail legs than the routing matrix can hold.
    #[error("{0} tail legs exceed the 4-leg routing matrix")]
    TooManyLegs(usize),

    /// A tail leg refers to an input or output the routing does not have.
    #[error("tail leg {input}->{output} is outside the routing")]
    LegOutOfRange {
        /// Input channel of the leg.
        input: usize,
        /// Output channel of the leg.
        output: usize,
    },

    /// Working memory could not be allocated.
    #[error("out of memory allocating {0} bytes of engine storage")]
    OutOfMemory(usize),
}

/// Errors that can occur while (re)configuring a [`Convolver`](crate::Convolver).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvolverError {
    /// The sample provider could not open the resource.
    #[error("failed to load impulse response '{path}': {message}")]
    Load {
        /// Resource path passed to the loader.
        path: String,
        /// Loader-specific description.
        message: String,
    },

    /// The resource has no channels or no samples.
    #[error("impulse response '{0}' is empty")]
    EmptyImpulseResponse(String),

    /// The IR channel count cannot be routed for the requested configuration.
    #[error("{channels}-channel impulse response cannot be used for {config:?}")]
    ChannelMismatch {
        /// Requested channel configuration.
        config: IrChannelConfig,
        /// Number of channels in the IR.
        channels: usize,
    },

    /// `reconfigure` was called with an unusable block size.
    #[error("invalid block size {0}")]
    InvalidBlockSize(usize),

    /// The partitioned engine rejected the configuration.
    #[error("engine configuration failed: {0}")]
    Engine(#[from] EngineError),

    /// The background reconfiguration thread could not be started.
    #[error("failed to start reconfiguration worker: {0}")]
    Worker(String),
}

impl ConvolverError {
    /// Create a load error.
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConvolverError::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConvolverError>;
