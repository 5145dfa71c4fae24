//! This crate contains implementations of the [`Agent`](vnsim_core::Agent) trait. Each strategy
//! comes with a configuration type whose `factory` creates one agent per topology node.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod random;
pub mod relay;
pub mod widest;

pub use crate::random::{RandomPass, RandomPassAgent};
pub use crate::relay::Relay;
pub use crate::widest::WidestLink;
