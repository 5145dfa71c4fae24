//! An agent that forwards data to a random neighbor and loses a small share of it on arrival.

use std::cell::RefCell;

use log::trace;
use rand::prelude::*;
use vnsim_core::{network::Node, Agent, Neighborhood, Topology};

/// Configuration of [`RandomPassAgent`]s.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct RandomPass {
    /// Base seed. Every node derives its own generator from this seed and its ID, so runs with
    /// the same seed and topology are identical.
    #[builder(default)]
    seed: u64,
    /// Data generated per unit of `dt`.
    #[builder(default = 1.0)]
    rate: f64,
    /// Fraction of arriving data that is processed.
    #[builder(default = 0.995)]
    retention: f64,
}

impl RandomPass {
    /// Returns a factory that creates a separately seeded agent for every node.
    pub fn factory(&self) -> impl FnMut(&Topology, &Node) -> RandomPassAgent + '_ {
        move |_, node| {
            // Spread consecutive IDs over the seed space
            let salt = (node.id().inner() as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            RandomPassAgent {
                rng: RefCell::new(StdRng::seed_from_u64(self.seed ^ salt)),
                rate: self.rate,
                retention: self.retention,
            }
        }
    }
}

/// Picks the next hop uniformly at random.
#[derive(Debug)]
pub struct RandomPassAgent {
    rng: RefCell<StdRng>,
    rate: f64,
    retention: f64,
}

impl Agent for RandomPassAgent {
    fn generate_inbound_data(&self, _: &Node, dt: f64) -> f64 {
        self.rate * dt
    }

    fn next_hop(&self, node: &Node, neighborhood: &Neighborhood<'_, Self>, _: f64) -> usize {
        let choice = self.rng.borrow_mut().gen_range(0..neighborhood.len());
        trace!("{} picked {} of {}", node.name(), choice, neighborhood.len());
        choice
    }

    fn processed_data_amount(
        &self,
        _: &Node,
        _: &Neighborhood<'_, Self>,
        _: f64,
        amount: f64,
    ) -> f64 {
        amount * self.retention
    }
}
