//! A deterministic agent that always forwards to its first neighbor.

use vnsim_core::{network::Node, Agent, Neighborhood, Topology};

/// Generates a constant rate at gateways, forwards data to the first eligible neighbor and
/// processes a fixed fraction of whatever arrives.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Relay {
    /// Data generated per unit of `dt`.
    #[builder(default = 1.0)]
    rate: f64,
    /// Fraction of arriving data that is processed.
    #[builder(default = 1.0)]
    fraction: f64,
}

impl Relay {
    /// Returns a factory that gives every node a copy of this agent.
    pub fn factory(&self) -> impl FnMut(&Topology, &Node) -> Relay + '_ {
        move |_, _| self.clone()
    }
}

impl Agent for Relay {
    fn generate_inbound_data(&self, _: &Node, dt: f64) -> f64 {
        self.rate * dt
    }

    fn next_hop(&self, _: &Node, _: &Neighborhood<'_, Self>, _: f64) -> usize {
        0
    }

    fn processed_data_amount(
        &self,
        _: &Node,
        _: &Neighborhood<'_, Self>,
        _: f64,
        amount: f64,
    ) -> f64 {
        amount * self.fraction
    }
}
