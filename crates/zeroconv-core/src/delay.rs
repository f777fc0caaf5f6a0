//! Integer-sample delay line for latency alignment.
//!
//! The direct (time-domain) convolution path produces its output with no
//! buffering latency, while the partitioned engine's output lags by one
//! engine block. [`DelayLine`] holds the head path back so both paths
//! re-converge sample-exactly at the output.
//!
//! # Cold start
//!
//! A freshly created or cleared line outputs silence for the first `delay`
//! samples. What happens when [`DelayLine::reset`] is called on a line that
//! already holds audio is selected by [`ColdStart`]:
//!
//! | Policy | Buffer after `reset(delay)` |
//! |--------|-----------------------------|
//! | [`ColdStart::Retain`] | previous writes kept, playback continues from them |
//! | [`ColdStart::Clear`]  | zeroed, behaves like a fresh line |

/// Behaviour of [`DelayLine::reset`] on a line that has already been written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColdStart {
    /// Keep previously written samples (no implicit clear).
    #[default]
    Retain,
    /// Zero the buffer so the new delay starts from silence.
    Clear,
}

/// Fixed-length integer delay backed by a single circular buffer.
///
/// The buffer is only (re)allocated by [`reset`](Self::reset) when the
/// requested delay exceeds the current capacity, so callers on the
/// configuration side should size it up front with
/// [`with_capacity`](Self::with_capacity). [`run`](Self::run) never allocates.
///
/// # Example
///
/// ```rust
/// use zeroconv_core::DelayLine;
///
/// let mut line = DelayLine::with_capacity(4);
/// line.reset(2);
///
/// let mut buf = [1.0, 0.0, 0.0, 0.0];
/// line.run(&mut buf);
/// assert_eq!(buf, [0.0, 0.0, 1.0, 0.0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    buffer: Vec<f32>,
    /// Set once `run` has pushed samples through a non-zero delay.
    written: bool,
    delay: usize,
    pos: usize,
    cold_start: ColdStart,
}

impl DelayLine {
    /// Creates an empty pass-through line (delay 0, no storage).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pass-through line with storage for delays up to `max_delay`.
    pub fn with_capacity(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay],
            ..Self::default()
        }
    }

    /// Selects the [`ColdStart`] policy applied by later [`reset`](Self::reset) calls.
    pub fn with_cold_start(mut self, policy: ColdStart) -> Self {
        self.cold_start = policy;
        self
    }

    /// Current delay in samples.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Largest delay that can be set without reallocating.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Zeroes the buffer and rewinds the cursor. The delay is unchanged.
    pub fn clear(&mut self) {
        if self.written {
            self.buffer.fill(0.0);
        }
        self.written = false;
        self.pos = 0;
    }

    /// Sets the delay length. `0` turns the line into a pass-through.
    ///
    /// Grows the buffer when `delay` exceeds [`capacity`](Self::capacity).
    pub fn reset(&mut self, delay: usize) {
        if self.buffer.len() < delay {
            self.buffer.resize(delay, 0.0);
        }
        if self.cold_start == ColdStart::Clear && self.written {
            self.buffer.fill(0.0);
            self.written = false;
        }
        self.delay = delay;
        self.pos = if delay == 0 { 0 } else { self.pos % delay };
    }

    /// Replaces `buf` in place with the signal written `delay` samples earlier.
    #[inline]
    pub fn run(&mut self, buf: &mut [f32]) {
        if self.delay == 0 {
            return;
        }
        self.written = true;
        for sample in buf.iter_mut() {
            let out = self.buffer[self.pos];
            self.buffer[self.pos] = *sample;
            *sample = out;
            self.pos += 1;
            if self.pos == self.delay {
                self.pos = 0;
            }
        }
    }
}
