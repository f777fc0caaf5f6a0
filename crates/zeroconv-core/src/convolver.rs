//! The real-time convolution orchestrator.

use std::sync::Arc;

use crate::engine::{ConvolutionEngine, PartitionedEngine};
use crate::error::Result;
use crate::gain::DryWetGain;
use crate::kernel::{BuildJob, Kernel};
use crate::readable::IrLoader;
use crate::routing::{IrChannelConfig, Routing};
use crate::settings::IrSettings;
use crate::worker::{Reconfigurer, SchedulingHints};

/// Impulse-response convolver combining zero-latency direct convolution of
/// the IR head with a partitioned engine for the tail.
///
/// A `Convolver` lives on the audio thread. It starts unconfigured: until a
/// [`reconfigure`](Self::reconfigure) completes, `run_*` only applies the dry
/// gain (the wet path is silent). Builds can be issued from other threads
/// through a [`Reconfigurer`] handle; the finished configuration is adopted
/// at the start of the next `run_*` call, so each call is served entirely by
/// one configuration.
///
/// ## Latency
///
/// [`latency`](Self::latency) is the engine block latency. An impulse fed to a
/// leg appears on its output `latency() + pre_delay + channel_delay[leg]`
/// samples later, with head and tail re-joined sample-exactly.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use zeroconv_core::{
///     Convolver, IrChannelConfig, IrSettings, MemoryLoader, SampleBuffer, SchedulingHints,
/// };
///
/// let loader = MemoryLoader::new().with("room", vec![SampleBuffer::new(vec![1.0, 0.5], 48000)]);
/// let mut convolver: Convolver = Convolver::new(
///     "room",
///     48000,
///     SchedulingHints::default(),
///     IrChannelConfig::Mono,
///     IrSettings::default(),
///     Arc::new(loader),
/// );
///
/// convolver.reconfigure(256, false).unwrap();
/// assert!(convolver.ready());
/// assert_eq!(convolver.latency(), 256);
///
/// let mut block = [0.0f32; 256];
/// convolver.run_mono(&mut block);
/// ```
pub struct Convolver<E: ConvolutionEngine = PartitionedEngine> {
    handle: Reconfigurer<E>,
    kernel: Option<Box<Kernel<E>>>,
    gain: DryWetGain,
}

impl<E: ConvolutionEngine> std::fmt::Debug for Convolver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("path", &self.path())
            .field("channel_config", &self.channel_config())
            .field("latency", &self.latency())
            .field("ready", &self.ready())
            .finish_non_exhaustive()
    }
}

impl<E: ConvolutionEngine> Convolver<E> {
    /// Creates an unconfigured convolver for the IR at `path`.
    ///
    /// Nothing is loaded until [`reconfigure`](Self::reconfigure).
    pub fn new(
        path: impl Into<String>,
        sample_rate: u32,
        hints: SchedulingHints,
        channel_config: IrChannelConfig,
        settings: IrSettings,
        loader: Arc<dyn IrLoader>,
    ) -> Self {
        let job = BuildJob {
            path: path.into(),
            sample_rate,
            config: channel_config,
            settings,
        };
        Self {
            handle: Reconfigurer::new(job, loader, hints),
            kernel: None,
            gain: DryWetGain::new(),
        }
    }

    /// (Re)builds the configuration for host blocks of up to `max_block_size`.
    ///
    /// With `threaded == false` the build runs here and, on success, is in
    /// effect when this returns. With `threaded == true` it runs on a worker
    /// thread and [`ready`](Self::ready) reports completion. On failure the
    /// previous configuration, if any, keeps running.
    pub fn reconfigure(&mut self, max_block_size: usize, threaded: bool) -> Result<()> {
        self.handle.reconfigure(max_block_size, threaded)?;
        if !threaded {
            self.adopt_pending();
        }
        Ok(())
    }

    /// Handle for issuing reconfigurations from other threads.
    pub fn reconfigurer(&self) -> Reconfigurer<E> {
        self.handle.clone()
    }

    /// Installs a freshly published configuration, if any. Never blocks.
    fn adopt_pending(&mut self) {
        let Some(kernel) = self.handle.shared().try_take_pending() else {
            return;
        };
        self.gain.set_block_size(kernel.block_size());
        if let Some(old) = self.kernel.replace(kernel) {
            self.handle.shared().retire(old);
        }
    }

    /// Processes one mono chunk in place.
    ///
    /// Intended for chunks that do not straddle an engine block; longer or
    /// misaligned chunks are handled as by
    /// [`run_buffered_mono`](Self::run_buffered_mono). On a two-output
    /// configuration only the dry gain is applied.
    pub fn run_mono(&mut self, buf: &mut [f32]) {
        self.adopt_pending();
        match self.kernel.as_deref_mut() {
            Some(kernel) if kernel.n_outputs() == 1 && buf.len() <= kernel.remaining_in_block() => {
                kernel.process(buf, None);
                self.gain.mix_mono(buf, kernel.wet(0, buf.len()));
            }
            _ => self.mono_chunks(buf),
        }
    }

    /// Processes a stereo chunk in place.
    ///
    /// For [`IrChannelConfig::MonoToStereo`] the input is read from `left`
    /// and both buffers receive the two outputs. On a mono configuration only
    /// the dry gain is applied. Block alignment is handled as in
    /// [`run_mono`](Self::run_mono).
    pub fn run_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.adopt_pending();
        let n = left.len().min(right.len());
        let (left, right) = (&mut left[..n], &mut right[..n]);
        match self.kernel.as_deref_mut() {
            Some(kernel) if kernel.n_outputs() == 2 && n <= kernel.remaining_in_block() => {
                let mono_in = kernel.routing().n_inputs() == 1;
                kernel.process(left, (!mono_in).then_some(&*right));
                self.gain
                    .mix_stereo(left, right, kernel.wet(0, n), kernel.wet(1, n), mono_in);
            }
            _ => self.stereo_chunks(left, right),
        }
    }

    /// Processes any number of mono samples, re-blocking against the engine.
    pub fn run_buffered_mono(&mut self, buf: &mut [f32]) {
        self.adopt_pending();
        self.mono_chunks(buf);
    }

    /// Processes any number of stereo samples, re-blocking against the engine.
    pub fn run_buffered_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.adopt_pending();
        let n = left.len().min(right.len());
        self.stereo_chunks(&mut left[..n], &mut right[..n]);
    }

    fn mono_chunks(&mut self, buf: &mut [f32]) {
        let Self { kernel, gain, .. } = self;
        let Some(kernel) = kernel.as_deref_mut().filter(|k| k.n_outputs() == 1) else {
            gain.apply_dry(buf, None);
            return;
        };
        let mut rest = buf;
        while !rest.is_empty() {
            let n = kernel.remaining_in_block().min(rest.len());
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(n);
            kernel.process(chunk, None);
            gain.mix_mono(chunk, kernel.wet(0, n));
            rest = tail;
        }
    }

    fn stereo_chunks(&mut self, left: &mut [f32], right: &mut [f32]) {
        let Self { kernel, gain, .. } = self;
        let Some(kernel) = kernel.as_deref_mut().filter(|k| k.n_outputs() == 2) else {
            gain.apply_dry(left, Some(right));
            return;
        };
        let mono_in = kernel.routing().n_inputs() == 1;
        let (mut rest_l, mut rest_r) = (left, right);
        while !rest_l.is_empty() {
            let n = kernel.remaining_in_block().min(rest_l.len());
            let (chunk_l, tail_l) = std::mem::take(&mut rest_l).split_at_mut(n);
            let (chunk_r, tail_r) = std::mem::take(&mut rest_r).split_at_mut(n);
            kernel.process(chunk_l, (!mono_in).then_some(&*chunk_r));
            gain.mix_stereo(chunk_l, chunk_r, kernel.wet(0, n), kernel.wet(1, n), mono_in);
            rest_l = tail_l;
            rest_r = tail_r;
        }
    }

    /// Sets the dry (unprocessed) and wet (convolved) output gains.
    ///
    /// With `interpolate` the change is smoothed over roughly one engine block.
    pub fn set_output_gain(&mut self, dry: f32, wet: f32, interpolate: bool) {
        self.gain.set_target(dry, wet, interpolate);
    }

    /// Current `(dry, wet)` output gains.
    pub fn output_gain(&self) -> (f32, f32) {
        self.gain.current()
    }

    /// Disables processing and clears all audio state.
    ///
    /// Any pending or in-flight build is discarded; [`ready`](Self::ready)
    /// stays false until the next successful reconfiguration. Until then the
    /// wet path is silent. Never blocks or deallocates.
    pub fn reset(&mut self) -> bool {
        self.handle.shared().invalidate();
        if let Some(kernel) = self.kernel.as_deref_mut() {
            kernel.reset();
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("convolver reset: '{}'", self.path());
        true
    }

    /// Whether a working configuration is in place (or about to be adopted)
    /// and no build is in flight.
    pub fn ready(&self) -> bool {
        let shared = self.handle.shared();
        if shared.is_building() {
            return false;
        }
        self.kernel.as_ref().is_some_and(|k| k.enabled()) || shared.has_servable_pending()
    }

    /// Engine block latency of the latest configuration, `0` before any.
    pub fn latency(&self) -> usize {
        self.handle.shared().latency()
    }

    /// Requested channel layout.
    pub fn channel_config(&self) -> IrChannelConfig {
        self.handle.job().config
    }

    /// Routing of the configuration currently serving audio.
    pub fn routing(&self) -> Option<Routing> {
        self.kernel.as_ref().map(|k| k.routing())
    }

    /// Number of input channels.
    pub fn n_inputs(&self) -> usize {
        self.channel_config().n_inputs()
    }

    /// Number of output channels.
    pub fn n_outputs(&self) -> usize {
        self.channel_config().n_outputs()
    }

    /// Resource path of the impulse response.
    pub fn path(&self) -> &str {
        &self.handle.job().path
    }

    /// Sample rate the IR is converted to.
    pub fn sample_rate(&self) -> u32 {
        self.handle.job().sample_rate
    }

    /// Settings applied on every build.
    pub fn settings(&self) -> &IrSettings {
        &self.handle.job().settings
    }

    /// Whether stereo input is collapsed to mono before convolving.
    pub fn sum_inputs(&self) -> bool {
        self.settings().sum_inputs
    }

    /// Extra latency to report to the host, separate from [`latency`](Self::latency).
    pub fn artificial_latency(&self) -> i32 {
        self.settings().artificial_latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readable::{MemoryLoader, SampleBuffer};
    use crate::routing::IrChannelConfig;

    fn convolver(config: IrChannelConfig, channels: Vec<Vec<f32>>) -> Convolver {
        let loader = MemoryLoader::new().with(
            "ir",
            channels
                .into_iter()
                .map(|c| SampleBuffer::new(c, 48000))
                .collect(),
        );
        Convolver::new(
            "ir",
            48000,
            SchedulingHints::default(),
            config,
            IrSettings::default(),
            Arc::new(loader),
        )
    }

    #[test]
    fn test_unconfigured_applies_dry_only() {
        let mut c = convolver(IrChannelConfig::Mono, vec![vec![1.0]]);
        assert!(!c.ready());
        assert_eq!(c.latency(), 0);

        c.set_output_gain(0.5, 1.0, false);
        let mut buf = [1.0; 8];
        c.run_mono(&mut buf);
        assert_eq!(buf, [0.5; 8]);
    }

    #[test]
    fn test_inline_reconfigure_takes_effect() {
        let mut c = convolver(IrChannelConfig::Mono, vec![vec![1.0]]);
        c.reconfigure(64, false).unwrap();
        assert!(c.ready());
        assert_eq!(c.routing(), Some(Routing::Mono));

        let mut buf = [0.0; 64];
        buf[0] = 1.0;
        c.run_mono(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
        let mut next = [0.0; 64];
        c.run_mono(&mut next);
        assert!((next[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrong_width_call_is_dry_only() {
        let mut c = convolver(IrChannelConfig::Stereo, vec![vec![1.0], vec![1.0]]);
        c.reconfigure(64, false).unwrap();
        c.set_output_gain(1.0, 1.0, false);
        let mut buf = [0.25; 16];
        c.run_mono(&mut buf);
        assert_eq!(buf, [0.25; 16]);
    }

    #[test]
    fn test_reset_disables_until_reconfigure() {
        let mut c = convolver(IrChannelConfig::Mono, vec![vec![1.0]]);
        c.reconfigure(64, false).unwrap();
        assert!(c.reset());
        assert!(!c.ready());
        c.reconfigure(64, false).unwrap();
        assert!(c.ready());
    }
}
