//! Block-based convolution engine seam.
//!
//! The orchestrator hands the "tail" of every routing leg to a
//! [`ConvolutionEngine`] and treats its block size and latency as
//! authoritative. The engine owns its per-channel input and output block
//! buffers: the caller fills [`input_mut`](ConvolutionEngine::input_mut),
//! calls [`process`](ConvolutionEngine::process) once per full block and
//! reads [`output`](ConvolutionEngine::output).
//!
//! [`PartitionedEngine`] is the default implementation.

mod partitioned;

pub use partitioned::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, PartitionedEngine};

use crate::error::EngineError;
use crate::routing::Routing;

/// Tail samples of one routing leg.
#[derive(Debug, Clone, PartialEq)]
pub struct TailLeg {
    /// Input channel feeding the leg.
    pub input: usize,
    /// Output channel receiving the leg.
    pub output: usize,
    /// Silence, in samples, before `samples` start.
    pub offset: usize,
    /// Gain-scaled impulse-response samples.
    pub samples: Vec<f32>,
}

/// A block-based convolution processor.
///
/// `configure` runs in the configuration context and may allocate;
/// `process`, `reset`, `input_mut` and `output` must be real-time safe.
pub trait ConvolutionEngine: Default + Send + 'static {
    /// Prepares the engine for `routing` with the given tails.
    ///
    /// The block size is `max_block_size` rounded to the engine's granularity.
    fn configure(
        &mut self,
        routing: Routing,
        tails: &[TailLeg],
        max_block_size: usize,
    ) -> Result<(), EngineError>;

    /// Clears all history; configuration is kept.
    fn reset(&mut self);

    /// Convolves one full block from the input buffers into the output buffers.
    fn process(&mut self);

    /// Latency in samples introduced by block processing.
    fn latency(&self) -> usize;

    /// Samples per processed block.
    fn block_size(&self) -> usize;

    /// Input block buffer of `channel` (empty if out of range).
    fn input_mut(&mut self, channel: usize) -> &mut [f32];

    /// Output block buffer of `channel` (empty if out of range).
    fn output(&self, channel: usize) -> &[f32];
}
