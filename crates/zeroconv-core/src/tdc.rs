//! Direct (time-domain) convolution of an impulse-response head.
//!
//! The first [`TimeDomainConvolver::MAX_TAPS`] samples of each routing leg are
//! rendered here instead of by the partitioned engine. Cost is
//! `O(n × MAX_TAPS)` per block with no allocation and no internal state
//! touched while running: the caller supplies the input history.

use crate::readable::Readable;

/// Fixed-length FIR over the head of one IR leg.
#[derive(Debug, Clone)]
pub struct TimeDomainConvolver {
    enabled: bool,
    ir: [f32; Self::MAX_TAPS],
    /// Delay requested for the leg.
    delay: usize,
    /// Portion of `delay` absorbed as leading zero taps.
    offset: usize,
    /// IR samples consumed from the provider.
    head_len: usize,
}

impl Default for TimeDomainConvolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDomainConvolver {
    /// Number of taps, i.e. the head length in samples.
    pub const MAX_TAPS: usize = 64;

    /// Input samples preceding each block that [`run`](Self::run) expects.
    pub const HISTORY: usize = Self::MAX_TAPS - 1;

    /// Creates a disabled convolver.
    pub fn new() -> Self {
        Self {
            enabled: false,
            ir: [0.0; Self::MAX_TAPS],
            delay: 0,
            offset: 0,
            head_len: 0,
        }
    }

    /// Disables processing and clears the taps.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.ir = [0.0; Self::MAX_TAPS];
        self.delay = 0;
        self.offset = 0;
        self.head_len = 0;
    }

    /// Loads the head of `provider`, scaled by `gain`, for a leg delayed by `delay`.
    ///
    /// A delay shorter than the tap count is absorbed as leading zero taps;
    /// anything longer is left to the paired [`DelayLine`](crate::DelayLine)
    /// (see [`residual_delay`](Self::residual_delay)). Stays disabled if the
    /// provider yields no samples.
    pub fn configure(&mut self, provider: &dyn Readable, gain: f32, delay: usize) {
        self.reset();
        self.delay = delay;
        self.offset = if delay < Self::MAX_TAPS { delay } else { 0 };

        let n = provider.read(&mut self.ir[self.offset..], 0);
        if n == 0 {
            self.offset = 0;
            return;
        }
        if gain != 1.0 {
            for tap in &mut self.ir[self.offset..self.offset + n] {
                *tap *= gain;
            }
        }
        self.head_len = n;
        self.enabled = true;
    }

    /// Whether [`configure`](Self::configure) succeeded.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Delay the leg was configured with.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Delay still to be applied by the paired delay line.
    pub fn residual_delay(&self) -> usize {
        self.delay - self.offset
    }

    /// Number of IR samples rendered by this head; the tail starts here.
    pub fn head_len(&self) -> usize {
        self.head_len
    }

    /// Convolves and adds `out.len()` samples into `out`.
    ///
    /// `input` must hold [`HISTORY`](Self::HISTORY) samples of history
    /// followed by the `out.len()` new input samples. Contributes nothing
    /// when disabled or when `input` is too short.
    #[inline]
    pub fn run(&self, out: &mut [f32], input: &[f32]) {
        if !self.enabled || input.len() < out.len() + Self::HISTORY {
            return;
        }
        let taps = &self.ir[self.offset..self.offset + self.head_len];
        for (i, dst) in out.iter_mut().enumerate() {
            let newest = i + Self::HISTORY - self.offset;
            let mut acc = 0.0;
            for (k, &h) in taps.iter().enumerate() {
                acc += h * input[newest - k];
            }
            *dst += acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readable::SampleBuffer;

    fn with_history(block: &[f32]) -> Vec<f32> {
        let mut input = vec![0.0; TimeDomainConvolver::HISTORY];
        input.extend_from_slice(block);
        input
    }

    #[test]
    fn test_unit_tap_is_identity() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![1.0], 48000), 1.0, 0);
        assert!(tdc.enabled());

        let block: Vec<f32> = (0..32).map(|i| (i as f32 * 0.3).sin()).collect();
        let mut out = vec![0.0; block.len()];
        tdc.run(&mut out, &with_history(&block));
        assert_eq!(out, block);
    }

    #[test]
    fn test_disabled_contributes_nothing() {
        let tdc = TimeDomainConvolver::new();
        let mut out = vec![0.25; 8];
        tdc.run(&mut out, &with_history(&[1.0; 8]));
        assert_eq!(out, vec![0.25; 8]);
    }

    #[test]
    fn test_empty_provider_stays_disabled() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(Vec::new(), 48000), 1.0, 3);
        assert!(!tdc.enabled());
        assert_eq!(tdc.head_len(), 0);
    }

    #[test]
    fn test_gain_scales_taps() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![1.0, 0.5], 48000), 0.5, 0);

        let mut out = vec![0.0; 4];
        tdc.run(&mut out, &with_history(&[1.0, 0.0, 0.0, 0.0]));
        assert_eq!(out, vec![0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_short_delay_absorbed_as_offset() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![1.0; 100], 48000), 1.0, 10);
        assert_eq!(tdc.residual_delay(), 0);
        assert_eq!(tdc.head_len(), TimeDomainConvolver::MAX_TAPS - 10);

        let mut block = vec![0.0; 16];
        block[0] = 1.0;
        let mut out = vec![0.0; 16];
        tdc.run(&mut out, &with_history(&block));
        assert!(out[..10].iter().all(|&s| s == 0.0));
        assert!(out[10..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_long_delay_left_to_delay_line() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![1.0; 100], 48000), 1.0, 500);
        assert_eq!(tdc.residual_delay(), 500);
        assert_eq!(tdc.head_len(), TimeDomainConvolver::MAX_TAPS);
    }

    #[test]
    fn test_history_carries_across_blocks() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![0.0, 0.0, 1.0], 48000), 1.0, 0);

        // Impulse on the last sample of the previous block must surface two
        // samples later, at index 1 of this block.
        let mut input = vec![0.0; TimeDomainConvolver::HISTORY + 4];
        input[TimeDomainConvolver::HISTORY - 1] = 1.0;
        let mut out = vec![0.0; 4];
        tdc.run(&mut out, &input);
        assert_eq!(out, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reset_disables() {
        let mut tdc = TimeDomainConvolver::new();
        tdc.configure(&SampleBuffer::new(vec![1.0], 48000), 1.0, 0);
        tdc.reset();
        assert!(!tdc.enabled());
        let mut out = vec![0.0; 4];
        tdc.run(&mut out, &with_history(&[1.0; 4]));
        assert_eq!(out, vec![0.0; 4]);
    }
}
