//! Uniformly partitioned overlap-add FFT convolution.
//!
//! Each tail is cut into partitions of one block `B` and transformed once at
//! configuration time (FFT size `2B`, so the linear convolution of a block
//! with a partition never wraps). Every processed block is transformed,
//! pushed into a frequency-domain delay line, multiplied against all
//! partitions and accumulated per output:
//!
//! ```text
//! Y_m = Σ_p H_p · X_{m-p}
//! y_m = IFFT(Y_m)[0..B] + overlap,   overlap = IFFT(Y_m)[B..2B]
//! ```
//!
//! Within a block the engine adds no delay; its reported latency is the
//! block size, the time needed to gather a block of input.
//!
//! Leading silence (pre-delay plus head length) is skipped by starting a
//! leg's partitions further back in the delay line instead of storing
//! zero spectra.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{ConvolutionEngine, TailLeg};
use crate::error::EngineError;
use crate::routing::{MAX_LEGS, Routing};

/// Smallest engine block size.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Largest engine block size.
pub const MAX_BLOCK_SIZE: usize = 16384;

#[derive(Clone)]
struct FftPair {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for FftPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FftPair({})", self.forward.len())
    }
}

#[derive(Debug)]
struct LegPlan {
    input: usize,
    output: usize,
    /// Delay-line age of the first stored partition.
    first_partition: usize,
    partitions: Vec<Vec<Complex<f32>>>,
}

/// Default [`ConvolutionEngine`]: uniform-partitioned FFT convolution via `rustfft`.
///
/// Block size is the requested maximum rounded up to a power of two and
/// clamped to [`MIN_BLOCK_SIZE`]..=[`MAX_BLOCK_SIZE`].
#[derive(Debug, Default)]
pub struct PartitionedEngine {
    block: usize,
    fft: Option<FftPair>,
    scratch: Vec<Complex<f32>>,
    legs: Vec<LegPlan>,
    /// Frequency-domain delay line per input, `n_partitions` spectra each.
    fdl: Vec<Vec<Vec<Complex<f32>>>>,
    /// Slot in the delay line holding the newest spectrum.
    current: usize,
    n_partitions: usize,
    accum: Vec<Complex<f32>>,
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
    overlap: Vec<Vec<f32>>,
}

/// Allocates `len` copies of `value`, reporting failure instead of aborting.
fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, EngineError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| EngineError::OutOfMemory(len.saturating_mul(size_of::<T>())))?;
    v.resize(len, value);
    Ok(v)
}

#[inline]
fn multiply_accumulate(acc: &mut [Complex<f32>], a: &[Complex<f32>], b: &[Complex<f32>]) {
    for ((dst, &x), &y) in acc.iter_mut().zip(a).zip(b) {
        *dst += x * y;
    }
}

impl PartitionedEngine {
    /// Creates an unconfigured engine (block size 0, silent).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions in the frequency-domain delay line.
    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    fn plan_leg(
        tail: &TailLeg,
        block: usize,
        fft: &FftPair,
        scratch: &mut [Complex<f32>],
    ) -> Result<LegPlan, EngineError> {
        let lead = tail.offset % block;
        let n_parts = (lead + tail.samples.len()).div_ceil(block);
        let mut partitions = Vec::new();
        partitions
            .try_reserve_exact(n_parts)
            .map_err(|_| EngineError::OutOfMemory(n_parts * 2 * block * size_of::<Complex<f32>>()))?;

        for p in 0..n_parts {
            let mut spectrum = try_filled(2 * block, Complex::default())?;
            for (j, bin) in spectrum[..block].iter_mut().enumerate() {
                let idx = p * block + j;
                if idx >= lead
                    && let Some(&s) = tail.samples.get(idx - lead)
                {
                    bin.re = s;
                }
            }
            fft.forward.process_with_scratch(&mut spectrum, scratch);
            partitions.push(spectrum);
        }

        Ok(LegPlan {
            input: tail.input,
            output: tail.output,
            first_partition: tail.offset / block,
            partitions,
        })
    }
}

impl ConvolutionEngine for PartitionedEngine {
    fn configure(
        &mut self,
        routing: Routing,
        tails: &[TailLeg],
        max_block_size: usize,
    ) -> Result<(), EngineError> {
        if max_block_size == 0 {
            return Err(EngineError::InvalidBlockSize(max_block_size));
        }
        if tails.len() > MAX_LEGS {
            return Err(EngineError::TooManyLegs(tails.len()));
        }
        let (n_inputs, n_outputs) = (routing.n_inputs(), routing.n_outputs());
        if let Some(bad) = tails
            .iter()
            .find(|t| t.input >= n_inputs || t.output >= n_outputs)
        {
            return Err(EngineError::LegOutOfRange {
                input: bad.input,
                output: bad.output,
            });
        }

        // Larger host buffers are split into engine blocks by the caller.
        let block = max_block_size
            .min(MAX_BLOCK_SIZE)
            .next_power_of_two()
            .max(MIN_BLOCK_SIZE);
        let fft_len = 2 * block;
        let mut planner = FftPlanner::<f32>::new();
        let fft = FftPair {
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
        };
        let scratch_len = fft
            .forward
            .get_inplace_scratch_len()
            .max(fft.inverse.get_inplace_scratch_len());
        let mut scratch = try_filled(scratch_len, Complex::default())?;

        let mut legs = Vec::with_capacity(tails.len());
        let mut n_partitions = 1;
        for tail in tails.iter().filter(|t| !t.samples.is_empty()) {
            let plan = Self::plan_leg(tail, block, &fft, &mut scratch)?;
            n_partitions = n_partitions.max(plan.first_partition + plan.partitions.len());
            legs.push(plan);
        }

        let mut fdl = Vec::with_capacity(n_inputs);
        for _ in 0..n_inputs {
            let mut ring = Vec::new();
            ring.try_reserve_exact(n_partitions).map_err(|_| {
                EngineError::OutOfMemory(n_partitions * fft_len * size_of::<Complex<f32>>())
            })?;
            for _ in 0..n_partitions {
                ring.push(try_filled(fft_len, Complex::default())?);
            }
            fdl.push(ring);
        }

        let inputs = (0..n_inputs)
            .map(|_| try_filled(block, 0.0))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = (0..n_outputs)
            .map(|_| try_filled(block, 0.0))
            .collect::<Result<Vec<_>, _>>()?;
        let overlap = (0..n_outputs)
            .map(|_| try_filled(block, 0.0))
            .collect::<Result<Vec<_>, _>>()?;

        *self = Self {
            block,
            fft: Some(fft),
            scratch,
            legs,
            fdl,
            current: 0,
            n_partitions,
            accum: try_filled(fft_len, Complex::default())?,
            inputs,
            outputs,
            overlap,
        };
        Ok(())
    }

    fn reset(&mut self) {
        for ring in &mut self.fdl {
            for spectrum in ring.iter_mut() {
                spectrum.fill(Complex::default());
            }
        }
        for buf in self
            .inputs
            .iter_mut()
            .chain(self.outputs.iter_mut())
            .chain(self.overlap.iter_mut())
        {
            buf.fill(0.0);
        }
        self.current = 0;
    }

    fn process(&mut self) {
        let Self {
            block,
            fft,
            scratch,
            legs,
            fdl,
            current,
            n_partitions,
            accum,
            inputs,
            outputs,
            overlap,
        } = self;
        let Some(fft) = fft.as_ref() else {
            return;
        };
        let block = *block;

        for (input, ring) in inputs.iter().zip(fdl.iter_mut()) {
            let slot = &mut ring[*current];
            for (bin, &x) in slot[..block].iter_mut().zip(input.iter()) {
                *bin = Complex::new(x, 0.0);
            }
            slot[block..].fill(Complex::default());
            fft.forward.process_with_scratch(slot, scratch);
        }

        let norm = 1.0 / (2 * block) as f32;
        for (o, (out, tail)) in outputs.iter_mut().zip(overlap.iter_mut()).enumerate() {
            accum.fill(Complex::default());
            for leg in legs.iter().filter(|leg| leg.output == o) {
                let ring = &fdl[leg.input];
                for (p, partition) in leg.partitions.iter().enumerate() {
                    let age = leg.first_partition + p;
                    let slot = (*current + *n_partitions - age) % *n_partitions;
                    multiply_accumulate(accum, partition, &ring[slot]);
                }
            }
            fft.inverse.process_with_scratch(accum, scratch);

            let (head, rest) = accum.split_at(block);
            for j in 0..block {
                out[j] = head[j].re * norm + tail[j];
                tail[j] = rest[j].re * norm;
            }
        }

        *current = (*current + 1) % *n_partitions;
    }

    fn latency(&self) -> usize {
        self.block
    }

    fn block_size(&self) -> usize {
        self.block
    }

    fn input_mut(&mut self, channel: usize) -> &mut [f32] {
        match self.inputs.get_mut(channel) {
            Some(buf) => buf,
            None => &mut [],
        }
    }

    fn output(&self, channel: usize) -> &[f32] {
        self.outputs.get(channel).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_convolution(x: &[f32], h: &[f32], offset: usize) -> Vec<f32> {
        let mut y = vec![0.0; x.len()];
        for n in 0..x.len() {
            for (k, &tap) in h.iter().enumerate() {
                if let Some(i) = n.checked_sub(offset + k) {
                    y[n] += tap * x[i];
                }
            }
        }
        y
    }

    fn run_blocks(engine: &mut PartitionedEngine, input: &[f32], output_ch: usize) -> Vec<f32> {
        let block = engine.block_size();
        let mut out = Vec::with_capacity(input.len());
        for chunk in input.chunks(block) {
            let buf = engine.input_mut(0);
            buf.fill(0.0);
            buf[..chunk.len()].copy_from_slice(chunk);
            engine.process();
            out.extend_from_slice(&engine.output(output_ch)[..chunk.len()]);
        }
        out
    }

    fn tail(input: usize, output: usize, offset: usize, samples: Vec<f32>) -> TailLeg {
        TailLeg {
            input,
            output,
            offset,
            samples,
        }
    }

    #[test]
    fn test_block_size_rounding() {
        let mut engine = PartitionedEngine::new();
        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, vec![1.0])], 100)
            .unwrap();
        assert_eq!(engine.block_size(), 128);
        assert_eq!(engine.latency(), 128);

        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, vec![1.0])], 8)
            .unwrap();
        assert_eq!(engine.block_size(), MIN_BLOCK_SIZE);
    }

    #[test]
    fn test_rejects_zero_block_size() {
        let mut engine = PartitionedEngine::new();
        assert_eq!(
            engine.configure(Routing::Mono, &[], 0),
            Err(EngineError::InvalidBlockSize(0))
        );
    }

    #[test]
    fn test_large_block_clamped() {
        let mut engine = PartitionedEngine::new();
        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, vec![1.0])], MAX_BLOCK_SIZE + 1)
            .unwrap();
        assert_eq!(engine.block_size(), MAX_BLOCK_SIZE);

        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, vec![1.0])], 100_000)
            .unwrap();
        assert_eq!(engine.block_size(), MAX_BLOCK_SIZE);
        assert_eq!(engine.latency(), MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_rejects_leg_outside_routing() {
        let mut engine = PartitionedEngine::new();
        let err = engine
            .configure(Routing::Mono, &[tail(0, 1, 0, vec![1.0])], 64)
            .unwrap_err();
        assert_eq!(err, EngineError::LegOutOfRange { input: 0, output: 1 });
    }

    #[test]
    fn test_matches_direct_convolution() {
        let h: Vec<f32> = (0..300).map(|i| ((i * 7 % 13) as f32 - 6.0) / 10.0).collect();
        let x: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin()).collect();

        let mut engine = PartitionedEngine::new();
        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, h.clone())], 64)
            .unwrap();
        assert_eq!(engine.n_partitions(), 5);

        let got = run_blocks(&mut engine, &x, 0);
        let expected = direct_convolution(&x, &h, 0);
        for (i, (a, b)) in got.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-3, "sample {i}: {a} vs {b}");
        }
    }

    #[test]
    fn test_offset_shifts_response() {
        let h = vec![1.0, 0.5, 0.25];
        let mut x = vec![0.0; 512];
        x[0] = 1.0;

        let mut engine = PartitionedEngine::new();
        engine
            .configure(Routing::Mono, &[tail(0, 0, 200, h.clone())], 64)
            .unwrap();

        let got = run_blocks(&mut engine, &x, 0);
        for (i, &s) in got.iter().enumerate() {
            let expected = match i {
                200 => 1.0,
                201 => 0.5,
                202 => 0.25,
                _ => 0.0,
            };
            assert!((s - expected).abs() < 1e-4, "sample {i}: {s}");
        }
    }

    #[test]
    fn test_cross_leg_routes_to_other_output() {
        let mut engine = PartitionedEngine::new();
        engine
            .configure(
                Routing::StereoCross,
                &[tail(1, 0, 0, vec![0.5])],
                64,
            )
            .unwrap();

        engine.input_mut(1)[0] = 1.0;
        engine.process();
        assert!((engine.output(0)[0] - 0.5).abs() < 1e-5);
        assert!(engine.output(1).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut engine = PartitionedEngine::new();
        engine
            .configure(Routing::Mono, &[tail(0, 0, 0, vec![1.0; 200])], 64)
            .unwrap();
        engine.input_mut(0).fill(1.0);
        engine.process();

        engine.reset();
        engine.process();
        assert!(engine.output(0).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_unconfigured_is_silent() {
        let mut engine = PartitionedEngine::new();
        engine.process();
        assert_eq!(engine.latency(), 0);
        assert!(engine.input_mut(0).is_empty());
        assert!(engine.output(0).is_empty());
    }
}
