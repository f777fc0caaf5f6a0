//! Impulse-response settings record.

use crate::routing::MAX_LEGS;

/// Gain, delay and input handling applied when a configuration is built.
///
/// Per-leg arrays are indexed by routing leg (see [`Routing`](crate::Routing)):
/// leg 0 L→L (or M→M / M→L), leg 1 L→R (or R→R / M→R), leg 2 R→R, leg 3 R→L.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IrSettings {
    /// Overall linear gain applied to every leg.
    pub gain: f32,
    /// Samples by which the whole response is shifted.
    pub pre_delay: i32,
    /// Extra latency reported to the host, independent of processing.
    pub artificial_latency: i32,
    /// Linear gain per routing leg.
    pub channel_gain: [f32; MAX_LEGS],
    /// Additional delay in samples per routing leg.
    pub channel_delay: [i32; MAX_LEGS],
    /// Collapse a stereo input to mono before convolving.
    pub sum_inputs: bool,
}

impl Default for IrSettings {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pre_delay: 0,
            artificial_latency: 0,
            channel_gain: [1.0; MAX_LEGS],
            channel_delay: [0; MAX_LEGS],
            sum_inputs: false,
        }
    }
}

impl IrSettings {
    /// Effective linear gain of `leg`.
    pub fn leg_gain(&self, leg: usize) -> f32 {
        self.gain * self.channel_gain[leg]
    }

    /// Effective delay of `leg` in samples; negative totals clamp to zero.
    pub fn leg_delay(&self, leg: usize) -> usize {
        let delay = i64::from(self.pre_delay) + i64::from(self.channel_delay[leg]);
        delay.max(0) as usize
    }
}
