//! Core vnsim data structures, traits, and routines. The most common entry points are
//! [synthesize()], which builds a [topology](network::Topology) from a handful of counts, and
//! [`Simulation`], which routes data through it.

pub use vnsim_core::*;
