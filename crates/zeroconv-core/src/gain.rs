//! Click-free dry/wet gain blending.
//!
//! Abrupt gain changes on a convolution wet path are clearly audible, so dry
//! and wet gains follow a one-pole smoother toward their targets:
//!
//! ```text
//! g[n] = g[n-1] + coeff * (target - g[n-1])
//! ```
//!
//! With `0 < coeff <= 1` the trajectory is monotonic and never overshoots.
//! The coefficient is derived from the engine block size so that any
//! transition decays below [`SNAP_THRESHOLD`] within one block, at which
//! point the gain snaps exactly onto the target.
//!
//! ## Usage
//!
//! ```rust
//! use zeroconv_core::DryWetGain;
//!
//! let mut gain = DryWetGain::new();
//! gain.set_block_size(64);
//! gain.set_target(1.0, 0.0, true);
//!
//! for _ in 0..64 {
//!     gain.advance();
//! }
//! assert_eq!(gain.current(), (1.0, 0.0));
//! ```

/// Residual below which the smoothed gain snaps onto its target.
pub const SNAP_THRESHOLD: f32 = 1e-5;

/// Block length assumed before any engine has been configured.
pub const DEFAULT_SMOOTHING_BLOCK: usize = 64;

/// Decay in nepers over one block; `exp(-13)` leaves headroom below
/// [`SNAP_THRESHOLD`] for f32 rounding on long blocks.
const SETTLE_NEPERS: f32 = 13.0;

/// Smoothed dry/wet gain pair.
///
/// Starts fully wet (dry 0, wet 1).
#[derive(Debug, Clone)]
pub struct DryWetGain {
    dry: f32,
    wet: f32,
    dry_target: f32,
    wet_target: f32,
    /// One-pole coefficient (1 = instant).
    coeff: f32,
}

impl Default for DryWetGain {
    fn default() -> Self {
        Self::new()
    }
}

impl DryWetGain {
    /// Fully wet, smoothing sized for [`DEFAULT_SMOOTHING_BLOCK`].
    pub fn new() -> Self {
        let mut gain = Self {
            dry: 0.0,
            wet: 1.0,
            dry_target: 0.0,
            wet_target: 1.0,
            coeff: 1.0,
        };
        gain.set_block_size(DEFAULT_SMOOTHING_BLOCK);
        gain
    }

    /// Recalculates the coefficient so a transition settles within `block` samples.
    ///
    /// `coeff = 1 - exp(-SETTLE_NEPERS / block)`: after `block` samples the
    /// residual has shrunk by `exp(-SETTLE_NEPERS)`, below [`SNAP_THRESHOLD`].
    pub fn set_block_size(&mut self, block: usize) {
        self.coeff = if block <= 1 {
            1.0
        } else {
            1.0 - (-SETTLE_NEPERS / block as f32).exp()
        };
    }

    /// Sets new targets; without `interpolate` both gains jump immediately.
    pub fn set_target(&mut self, dry: f32, wet: f32, interpolate: bool) {
        self.dry_target = dry;
        self.wet_target = wet;
        if !interpolate {
            self.dry = dry;
            self.wet = wet;
        }
    }

    /// Current `(dry, wet)` without advancing.
    #[inline]
    pub fn current(&self) -> (f32, f32) {
        (self.dry, self.wet)
    }

    /// Target `(dry, wet)`.
    #[inline]
    pub fn target(&self) -> (f32, f32) {
        (self.dry_target, self.wet_target)
    }

    /// The smoothing coefficient.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Whether both gains sit exactly on their targets.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.dry == self.dry_target && self.wet == self.wet_target
    }

    /// Advances one sample and returns the new `(dry, wet)`.
    #[inline]
    pub fn advance(&mut self) -> (f32, f32) {
        self.dry = step(self.dry, self.dry_target, self.coeff);
        self.wet = step(self.wet, self.wet_target, self.coeff);
        (self.dry, self.wet)
    }

    /// Blends one channel in place: `buf = dry * buf + wet * wet_src`.
    #[inline]
    pub fn mix_mono(&mut self, buf: &mut [f32], wet_src: &[f32]) {
        if self.is_settled() {
            let (dry, wet) = self.current();
            for (dst, &w) in buf.iter_mut().zip(wet_src) {
                *dst = dry * *dst + wet * w;
            }
            return;
        }
        for (dst, &w) in buf.iter_mut().zip(wet_src) {
            let (dry, wet) = self.advance();
            *dst = dry * *dst + wet * w;
        }
    }

    /// Blends two channels in place sharing one gain trajectory.
    ///
    /// With `dry_right_from_left` the right output takes its dry signal from
    /// `left` (a mono input feeding both outputs).
    #[inline]
    pub fn mix_stereo(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        wet_left: &[f32],
        wet_right: &[f32],
        dry_right_from_left: bool,
    ) {
        let n = left
            .len()
            .min(right.len())
            .min(wet_left.len())
            .min(wet_right.len());
        for i in 0..n {
            let (dry, wet) = if self.is_settled() {
                self.current()
            } else {
                self.advance()
            };
            let dry_r = if dry_right_from_left { left[i] } else { right[i] };
            left[i] = dry * left[i] + wet * wet_left[i];
            right[i] = dry * dry_r + wet * wet_right[i];
        }
    }

    /// Applies only the dry gain (silent wet path) to one or two channels.
    pub fn apply_dry(&mut self, left: &mut [f32], mut right: Option<&mut [f32]>) {
        for i in 0..left.len() {
            let (dry, _) = if self.is_settled() {
                self.current()
            } else {
                self.advance()
            };
            left[i] *= dry;
            if let Some(sample) = right.as_deref_mut().and_then(|r| r.get_mut(i)) {
                *sample *= dry;
            }
        }
    }
}

#[inline]
fn step(current: f32, target: f32, coeff: f32) -> f32 {
    let next = current + coeff * (target - current);
    // A step below half an ulp stalls; finish the ramp instead.
    if next == current || (target - next).abs() < SNAP_THRESHOLD {
        target
    } else {
        next
    }
}
