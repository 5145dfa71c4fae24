#![warn(unreachable_pub, missing_debug_implementations)]

//! The core vnsim library. This crate defines [the routine](synth::synthesize) that turns a
//! handful of counts into a [topology](network::Topology) of switches, hosts and overlay
//! containers, and the [simulation](sim::Simulation) that routes data through it.

#[macro_use]
mod ident;

pub mod config;
pub mod network;
pub mod registry;
pub mod sim;
pub mod synth;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, Ipv4Prefix};
pub use network::{Node, NodeKind, Topology, TopologyError};
pub use registry::{EntityId, EntityKind, Identity, LocalId, Registry};
pub use sim::{Agent, Neighborhood, SimError, Simulation, Stats, StatsSnapshot};
pub use synth::{synthesize, ImageSpec, SynthError, SynthOpts, Synthesized};
