//! An agent that forwards data over the link with the most bandwidth.

use vnsim_core::{
    network::{Edge, Node},
    units::BitsPerSec,
    Agent, Neighborhood, Topology,
};

/// Forwards data over the widest physical link, preferring earlier neighbors on ties.
///
/// Generation and processing work as in [`Relay`](crate::Relay).
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct WidestLink {
    /// Data generated per unit of `dt`.
    #[builder(default = 1.0)]
    rate: f64,
    /// Fraction of arriving data that is processed.
    #[builder(default = 1.0)]
    fraction: f64,
}

impl WidestLink {
    /// Returns a factory that gives every node a copy of this agent.
    pub fn factory(&self) -> impl FnMut(&Topology, &Node) -> WidestLink + '_ {
        move |_, _| self.clone()
    }
}

fn bandwidth(edge: &Edge) -> BitsPerSec {
    match edge {
        Edge::PhysicalLink(link) => link.bandwidth,
        Edge::Deployment(_) => BitsPerSec::ZERO,
    }
}

impl Agent for WidestLink {
    fn generate_inbound_data(&self, _: &Node, dt: f64) -> f64 {
        self.rate * dt
    }

    fn next_hop(&self, _: &Node, neighborhood: &Neighborhood<'_, Self>, _: f64) -> usize {
        let mut best = 0;
        for (i, edge) in neighborhood.edges().iter().enumerate() {
            if bandwidth(edge) > bandwidth(neighborhood.edges()[best]) {
                best = i;
            }
        }
        best
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
