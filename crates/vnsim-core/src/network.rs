//! The network model: the entities a virtualized network is made of, and the [`Topology`] graph
//! that joins them.

pub mod topology;
pub mod types;

pub use topology::{Topology, TopologyError};
pub use types::*;
