//! A fully built configuration: engine, head convolvers, delay lines and
//! the audio-side working buffers they share.
//!
//! Everything a [`Kernel`] needs while processing is allocated by
//! [`Kernel::build`]; [`Kernel::process`] only copies and accumulates into
//! that storage.

use crate::delay::DelayLine;
use crate::engine::{ConvolutionEngine, TailLeg};
use crate::error::{ConvolverError, EngineError};
use crate::readable::{IrLoader, Readable};
use crate::routing::{IrChannelConfig, LegRoute, MAX_CHANNELS, Routing};
use crate::settings::IrSettings;
use crate::tdc::TimeDomainConvolver;

const HISTORY: usize = TimeDomainConvolver::HISTORY;

/// Everything needed to build a [`Kernel`] except the block size.
#[derive(Debug, Clone)]
pub(crate) struct BuildJob {
    pub path: String,
    pub sample_rate: u32,
    pub config: IrChannelConfig,
    pub settings: IrSettings,
}

#[derive(Debug)]
struct Leg {
    route: LegRoute,
    tdc: TimeDomainConvolver,
    /// Holds the head back by engine latency plus whatever delay the taps
    /// could not absorb.
    delay: DelayLine,
}

#[derive(Debug)]
pub(crate) struct Kernel<E> {
    routing: Routing,
    engine: E,
    legs: Vec<Leg>,
    /// Per input: `HISTORY` past samples followed by room for one block.
    history: Vec<Vec<f32>>,
    /// Per output: wet signal of the last processed chunk.
    wet: Vec<Vec<f32>>,
    scratch: Vec<f32>,
    /// Write position inside the current engine block.
    offset: usize,
    enabled: bool,
    sum_inputs: bool,
    latency: usize,
}

impl<E: ConvolutionEngine> Kernel<E> {
    /// Loads the impulse response and builds a ready-to-run configuration.
    pub(crate) fn build(
        loader: &dyn IrLoader,
        job: &BuildJob,
        max_block_size: usize,
    ) -> Result<Self, ConvolverError> {
        if max_block_size == 0 {
            return Err(ConvolverError::InvalidBlockSize(max_block_size));
        }

        let mut channels = loader.load(&job.path, job.sample_rate)?;
        let ir_len = channels
            .iter()
            .map(Readable::readable_length)
            .max()
            .unwrap_or(0);
        if ir_len == 0 {
            return Err(ConvolverError::EmptyImpulseResponse(job.path.clone()));
        }
        let routing = Routing::resolve(job.config, channels.len())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "kernel_build: '{}' {} ch x {ir_len} -> {routing:?}",
            job.path,
            channels.len()
        );
        for channel in &mut channels {
            channel.set_length(ir_len);
        }

        let mut heads = Vec::with_capacity(routing.n_legs());
        let mut tails = Vec::with_capacity(routing.n_legs());
        for (index, route) in routing.legs().enumerate() {
            let ir = &channels[route.ir_channel];
            let gain = job.settings.leg_gain(index);
            let delay = job.settings.leg_delay(index);

            let mut tdc = TimeDomainConvolver::new();
            tdc.configure(ir, gain, delay);
            let head_len = tdc.head_len();

            tails.push(TailLeg {
                input: route.input,
                output: route.output,
                offset: delay + head_len,
                samples: ir.samples()[head_len..].iter().map(|s| s * gain).collect(),
            });
            heads.push((route, tdc));
        }

        let mut engine = E::default();
        engine.configure(routing, &tails, max_block_size)?;
        let latency = engine.latency();
        let block = engine.block_size();
        if block == 0 {
            return Err(EngineError::InvalidBlockSize(block).into());
        }

        let legs = heads
            .into_iter()
            .map(|(route, tdc)| {
                let total = latency + tdc.residual_delay();
                let mut delay = DelayLine::with_capacity(total);
                delay.reset(total);
                Leg { route, tdc, delay }
            })
            .collect();

        Ok(Self {
            routing,
            engine,
            legs,
            history: vec![vec![0.0; HISTORY + block]; routing.n_inputs()],
            wet: vec![vec![0.0; block]; routing.n_outputs()],
            scratch: vec![0.0; block],
            offset: 0,
            enabled: true,
            sum_inputs: job.settings.sum_inputs,
            latency,
        })
    }

    pub(crate) fn routing(&self) -> Routing {
        self.routing
    }

    pub(crate) fn n_outputs(&self) -> usize {
        self.routing.n_outputs()
    }

    pub(crate) fn latency(&self) -> usize {
        self.latency
    }

    pub(crate) fn block_size(&self) -> usize {
        self.engine.block_size()
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    /// Samples left before the current engine block is complete.
    #[inline]
    pub(crate) fn remaining_in_block(&self) -> usize {
        self.engine.block_size() - self.offset
    }

    /// Wet output of `channel` for the last processed chunk.
    #[inline]
    pub(crate) fn wet(&self, channel: usize, len: usize) -> &[f32] {
        &self.wet[channel][..len]
    }

    /// Clears all audio state and disables processing until replaced.
    pub(crate) fn reset(&mut self) {
        self.engine.reset();
        for leg in &mut self.legs {
            leg.delay.clear();
        }
        for buf in self.history.iter_mut().chain(self.wet.iter_mut()) {
            buf.fill(0.0);
        }
        self.offset = 0;
        self.enabled = false;
    }

    /// Convolves one chunk that does not cross an engine block boundary.
    ///
    /// `right` is the second input of a two-input routing; it is ignored
    /// otherwise. The result is available from [`wet`](Self::wet).
    pub(crate) fn process(&mut self, left: &[f32], right: Option<&[f32]>) {
        let n = left.len();
        let Self {
            routing,
            engine,
            legs,
            history,
            wet,
            scratch,
            offset,
            enabled,
            sum_inputs,
            ..
        } = self;
        debug_assert!(*offset + n <= engine.block_size());

        for out in wet.iter_mut() {
            out[..n].fill(0.0);
        }
        if !*enabled || n == 0 {
            return;
        }

        let n_inputs = routing.n_inputs().min(MAX_CHANNELS);
        let summed = *sum_inputs && n_inputs == 2;
        for (ch, hist) in history.iter_mut().enumerate().take(n_inputs) {
            let fresh = &mut hist[HISTORY..HISTORY + n];
            match (ch, right) {
                (_, Some(r)) if summed => {
                    for ((dst, &l), &r) in fresh.iter_mut().zip(left).zip(r) {
                        *dst = 0.5 * (l + r);
                    }
                }
                (0, _) => fresh.copy_from_slice(left),
                (_, Some(r)) => fresh.copy_from_slice(&r[..n]),
                (_, None) => fresh.fill(0.0),
            }
            engine.input_mut(ch)[*offset..*offset + n].copy_from_slice(fresh);
        }

        for (ch, out) in wet.iter_mut().enumerate() {
            out[..n].copy_from_slice(&engine.output(ch)[*offset..*offset + n]);
        }

        let head = &mut scratch[..n];
        for leg in legs.iter_mut() {
            head.fill(0.0);
            leg.tdc.run(head, &history[leg.route.input][..HISTORY + n]);
            leg.delay.run(head);
            for (dst, &s) in wet[leg.route.output][..n].iter_mut().zip(head.iter()) {
                *dst += s;
            }
        }

        for hist in history.iter_mut() {
            hist.copy_within(n..n + HISTORY, 0);
        }

        *offset += n;
        if *offset == engine.block_size() {
            engine.process();
            *offset = 0;
        }
    }
}
