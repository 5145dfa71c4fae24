//! Implementations of the [`Agent`](crate::core::Agent) trait.

pub use agent_impls::*;
