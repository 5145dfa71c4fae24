//! `vnsim` studies how data flows through a virtualized compute network. It synthesizes a
//! physical topology of switches and hosts, places overlay containers on the hosts, and simulates
//! how data entering at gateway switches is routed hop by hop until some node processes it.
//!
//! Routing decisions are made by per-node [agents](core::Agent). The [`impls`] module provides a
//! few ready-made ones.

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod impls;
