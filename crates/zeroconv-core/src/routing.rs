//! Channel-routing topology.
//!
//! [`IrChannelConfig`] is what the host asks for: how many inputs and outputs
//! the processor has. [`Routing`] is what a configuration actually runs once
//! the impulse response's channel count is known, and it knows exactly which
//! legs of the (at most 4-leg) routing matrix are active.
//!
//! | Routing | IR channels | Legs |
//! |---------|-------------|------|
//! | `Mono` | any (uses 1st) | M→M |
//! | `MonoToStereo` | 1 or 2+ | M→L, M→R |
//! | `StereoParallel` | 1, 2 or 3 | L→L, R→R |
//! | `StereoCross` | 4 | L→L, L→R, R→R, R→L |

use crate::error::ConvolverError;

/// Maximum number of routing legs of any configuration.
pub const MAX_LEGS: usize = 4;

/// Maximum number of input or output channels.
pub const MAX_CHANNELS: usize = 2;

/// Requested channel layout of a [`Convolver`](crate::Convolver).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IrChannelConfig {
    /// 1 in, 1 out, mono IR.
    #[default]
    Mono,
    /// 1 in, 2 out, stereo IR: M→L, M→R.
    MonoToStereo,
    /// 2 in, 2 out: stereo IR (L→L, R→R) or 4-channel IR (L→L, L→R, R→R, R→L).
    Stereo,
}

impl IrChannelConfig {
    /// Number of input channels consumed.
    pub const fn n_inputs(self) -> usize {
        match self {
            IrChannelConfig::Mono | IrChannelConfig::MonoToStereo => 1,
            IrChannelConfig::Stereo => 2,
        }
    }

    /// Number of output channels produced.
    pub const fn n_outputs(self) -> usize {
        match self {
            IrChannelConfig::Mono => 1,
            IrChannelConfig::MonoToStereo | IrChannelConfig::Stereo => 2,
        }
    }
}

/// One path of the routing matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegRoute {
    /// Input channel feeding the leg.
    pub input: usize,
    /// Output channel the leg contributes to.
    pub output: usize,
    /// IR channel convolved on this leg.
    pub ir_channel: usize,
}

const MONO_LEGS: [(usize, usize); 1] = [(0, 0)];
const MONO_TO_STEREO_LEGS: [(usize, usize); 2] = [(0, 0), (0, 1)];
const PARALLEL_LEGS: [(usize, usize); 2] = [(0, 0), (1, 1)];
const CROSS_LEGS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

/// Resolved routing of a built configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routing {
    /// One leg, M→M.
    Mono,
    /// Two legs sharing the mono input.
    MonoToStereo {
        /// Both legs use IR channel 0 (mono file).
        mono_ir: bool,
    },
    /// Two independent legs, no cross terms.
    StereoParallel {
        /// Both legs use IR channel 0 (mono file).
        mono_ir: bool,
    },
    /// Full 2×2 matrix from a 4-channel IR.
    StereoCross,
}

impl Routing {
    /// Resolves the routing for `config` given an IR with `ir_channels` channels.
    pub fn resolve(config: IrChannelConfig, ir_channels: usize) -> Result<Self, ConvolverError> {
        if ir_channels == 0 || ir_channels > MAX_LEGS {
            return Err(ConvolverError::ChannelMismatch {
                config,
                channels: ir_channels,
            });
        }
        Ok(match config {
            IrChannelConfig::Mono => Routing::Mono,
            IrChannelConfig::MonoToStereo => Routing::MonoToStereo {
                mono_ir: ir_channels == 1,
            },
            IrChannelConfig::Stereo if ir_channels == 4 => Routing::StereoCross,
            IrChannelConfig::Stereo => Routing::StereoParallel {
                mono_ir: ir_channels == 1,
            },
        })
    }

    /// The channel configuration this routing implements.
    pub fn channel_config(self) -> IrChannelConfig {
        match self {
            Routing::Mono => IrChannelConfig::Mono,
            Routing::MonoToStereo { .. } => IrChannelConfig::MonoToStereo,
            Routing::StereoParallel { .. } | Routing::StereoCross => IrChannelConfig::Stereo,
        }
    }

    /// Number of input channels.
    pub fn n_inputs(self) -> usize {
        self.channel_config().n_inputs()
    }

    /// Number of output channels.
    pub fn n_outputs(self) -> usize {
        self.channel_config().n_outputs()
    }

    fn table(self) -> &'static [(usize, usize)] {
        match self {
            Routing::Mono => &MONO_LEGS,
            Routing::MonoToStereo { .. } => &MONO_TO_STEREO_LEGS,
            Routing::StereoParallel { .. } => &PARALLEL_LEGS,
            Routing::StereoCross => &CROSS_LEGS,
        }
    }

    /// Number of active legs.
    pub fn n_legs(self) -> usize {
        self.table().len()
    }

    /// Active legs in leg-index order.
    pub fn legs(self) -> impl Iterator<Item = LegRoute> {
        let mono_ir = matches!(
            self,
            Routing::MonoToStereo { mono_ir: true } | Routing::StereoParallel { mono_ir: true }
        );
        self.table()
            .iter()
            .enumerate()
            .map(move |(leg, &(input, output))| LegRoute {
                input,
                output,
                ir_channel: if mono_ir { 0 } else { leg },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_counts() {
        assert_eq!(IrChannelConfig::Mono.n_inputs(), 1);
        assert_eq!(IrChannelConfig::Mono.n_outputs(), 1);
        assert_eq!(IrChannelConfig::MonoToStereo.n_inputs(), 1);
        assert_eq!(IrChannelConfig::MonoToStereo.n_outputs(), 2);
        assert_eq!(IrChannelConfig::Stereo.n_inputs(), 2);
        assert_eq!(IrChannelConfig::Stereo.n_outputs(), 2);
    }

    #[test]
    fn test_resolve_rejects_unroutable_counts() {
        for channels in [0, 5, 8] {
            let err = Routing::resolve(IrChannelConfig::Stereo, channels).unwrap_err();
            assert!(matches!(err, ConvolverError::ChannelMismatch { .. }));
        }
    }

    #[test]
    fn test_mono_uses_first_channel() {
        let routing = Routing::resolve(IrChannelConfig::Mono, 2).unwrap();
        assert_eq!(routing, Routing::Mono);
        let legs: Vec<_> = routing.legs().collect();
        assert_eq!(
            legs,
            vec![LegRoute {
                input: 0,
                output: 0,
                ir_channel: 0
            }]
        );
    }

    #[test]
    fn test_mono_file_feeds_both_stereo_legs() {
        let routing = Routing::resolve(IrChannelConfig::MonoToStereo, 1).unwrap();
        assert!(routing.legs().all(|leg| leg.ir_channel == 0));
        assert_eq!(routing.n_legs(), 2);

        let routing = Routing::resolve(IrChannelConfig::Stereo, 1).unwrap();
        assert_eq!(routing, Routing::StereoParallel { mono_ir: true });
    }

    #[test]
    fn test_three_channel_stereo_is_parallel() {
        let routing = Routing::resolve(IrChannelConfig::Stereo, 3).unwrap();
        assert_eq!(routing, Routing::StereoParallel { mono_ir: false });
        let io: Vec<_> = routing.legs().map(|l| (l.input, l.output, l.ir_channel)).collect();
        assert_eq!(io, vec![(0, 0, 0), (1, 1, 1)]);
    }

    #[test]
    fn test_four_channel_cross_order() {
        let routing = Routing::resolve(IrChannelConfig::Stereo, 4).unwrap();
        assert_eq!(routing, Routing::StereoCross);
        let io: Vec<_> = routing.legs().map(|l| (l.input, l.output, l.ir_channel)).collect();
        // L→L, L→R, R→R, R→L
        assert_eq!(io, vec![(0, 0, 0), (0, 1, 1), (1, 1, 2), (1, 0, 3)]);
    }

    #[test]
    fn test_four_channel_mono_to_stereo_uses_first_two() {
        let routing = Routing::resolve(IrChannelConfig::MonoToStereo, 4).unwrap();
        let io: Vec<_> = routing.legs().map(|l| (l.input, l.output, l.ir_channel)).collect();
        assert_eq!(io, vec![(0, 0, 0), (0, 1, 1)]);
    }
}
