//! Zeroconv Core - real-time impulse-response convolution
//!
//! This crate orchestrates zero-latency convolution for audio processors:
//! the first samples of an impulse response are rendered by direct
//! convolution while the rest goes through a partitioned FFT engine, and the
//! two paths are delay-compensated so they re-join sample-exactly.
//!
//! # Core Abstractions
//!
//! ## Orchestration
//!
//! - [`Convolver`] - Routing, head/tail split, dry/wet blending, hot reconfiguration
//! - [`Reconfigurer`] - Thread-safe handle for rebuilding off the audio thread
//! - [`SchedulingHints`] - Policy and priority of the reconfiguration worker
//!
//! ## Building Blocks
//!
//! - [`TimeDomainConvolver`] - Direct convolution of the IR head (64 taps)
//! - [`DelayLine`] - Integer-sample alignment delay
//! - [`DryWetGain`] - Click-free dry/wet gain smoothing
//! - [`ConvolutionEngine`] - Block-based engine seam, with [`PartitionedEngine`] as default
//!
//! ## Configuration
//!
//! - [`IrChannelConfig`] / [`Routing`] - Requested layout and resolved routing matrix
//! - [`IrSettings`] - Gain, pre-delay and per-leg adjustments
//! - [`Readable`] / [`IrLoader`] - Impulse-response sample providers
//!
//! # Execution Contexts
//!
//! `run_*`, [`DelayLine::run`], [`TimeDomainConvolver::run`] and
//! [`ConvolutionEngine::process`] belong to the audio context: they never
//! block, allocate or return errors. Loading and building happen in the
//! configuration context, optionally on a worker thread.
//!
//! # Features
//!
//! - `tracing` - configuration-context log events via `tracing`
//! - `serde` - `Serialize`/`Deserialize` for the configuration records
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zeroconv_core::{
//!     Convolver, IrChannelConfig, IrSettings, MemoryLoader, SampleBuffer, SchedulingHints,
//! };
//!
//! let ir = vec![
//!     SampleBuffer::new(vec![1.0, 0.3, 0.1], 48000),
//!     SampleBuffer::new(vec![0.8, 0.2], 48000),
//! ];
//! let loader = Arc::new(MemoryLoader::new().with("plate.wav", ir));
//!
//! let mut convolver: Convolver = Convolver::new(
//!     "plate.wav",
//!     48000,
//!     SchedulingHints::default(),
//!     IrChannelConfig::Stereo,
//!     IrSettings::default(),
//!     loader,
//! );
//! convolver.reconfigure(128, false).unwrap();
//! convolver.set_output_gain(0.5, 0.5, true);
//!
//! let mut left = [0.0f32; 128];
//! let mut right = [0.0f32; 128];
//! convolver.run_stereo(&mut left, &mut right);
//! ```

pub mod convolver;
pub mod delay;
pub mod engine;
pub mod error;
pub mod gain;
mod kernel;
pub mod readable;
pub mod routing;
pub mod settings;
pub mod tdc;
pub mod worker;

pub use convolver::Convolver;
pub use delay::{ColdStart, DelayLine};
pub use engine::{ConvolutionEngine, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, PartitionedEngine, TailLeg};
pub use error::{ConvolverError, EngineError, Result};
pub use gain::{DryWetGain, SNAP_THRESHOLD};
pub use readable::{IrLoader, MemoryLoader, Readable, SampleBuffer};
pub use routing::{IrChannelConfig, LegRoute, MAX_CHANNELS, MAX_LEGS, Routing};
pub use settings::IrSettings;
pub use tdc::TimeDomainConvolver;
pub use worker::{Reconfigurer, SchedPolicy, SchedulingHints};
