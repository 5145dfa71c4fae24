//! This module defines the routing [`Simulation`]. Data enters the network at gateway switches and
//! is forwarded one hop per step until it reaches a terminal node, which processes it. Every
//! decision along the way is delegated to a per-node [`Agent`].

pub mod stats;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::network::{Edge, Node, Topology};
use crate::registry::EntityId;
use crate::units::Ticks;

pub use stats::{EdgeTotal, NodeTotal, Stats, StatsSnapshot};

/// The decision strategy of a single node. One agent is created for every node of the topology.
///
/// Agents are consulted through shared references because neighbors are visible to the deciding
/// agent. Agents that keep mutable state (a random number generator, for example) use interior
/// mutability.
pub trait Agent: Sized {
    /// Returns the amount of data entering the network at `node` during a step of length `dt`.
    /// Only called for gateway switches.
    fn generate_inbound_data(&self, node: &Node, dt: f64) -> f64;

    /// Returns the index of the neighbor in `neighborhood` that data held by `node` is forwarded
    /// to. Only called for switches, with a non-empty neighborhood that excludes every node the
    /// data has already visited. An index out of range is a fatal error.
    fn next_hop(&self, node: &Node, neighborhood: &Neighborhood<'_, Self>, dt: f64) -> usize;

    /// Returns how much of `amount` arriving at terminal `node` is processed. Anything less than
    /// `amount` counts as lost. A result outside `[0, amount]` is a fatal error.
    fn processed_data_amount(
        &self,
        node: &Node,
        neighborhood: &Neighborhood<'_, Self>,
        dt: f64,
        amount: f64,
    ) -> f64;
}

/// The neighbors of a node, as seen by its agent.
#[derive(Debug)]
pub struct Neighborhood<'a, A> {
    nodes: Vec<EntityId>,
    agents: Vec<&'a A>,
    edges: Vec<&'a Edge>,
}

impl<'a, A> Neighborhood<'a, A> {
    fn collect(
        topology: &'a Topology,
        agents: &'a FxHashMap<EntityId, A>,
        node: EntityId,
        mut keep: impl FnMut(EntityId) -> bool,
    ) -> Result<Self, SimError> {
        let mut neighborhood = Self {
            nodes: Vec::new(),
            agents: Vec::new(),
            edges: Vec::new(),
        };
        for (n, edge) in topology.neighbors(node).filter(|&(n, _)| keep(n)) {
            let agent = agents.get(&n).ok_or(SimError::UnknownNode(n))?;
            neighborhood.nodes.push(n);
            neighborhood.agents.push(agent);
            neighborhood.edges.push(edge);
        }
        Ok(neighborhood)
    }

    /// Neighbor node IDs.
    pub fn nodes(&self) -> &[EntityId] {
        &self.nodes
    }

    /// Neighbor agents, in the same order as [`Neighborhood::nodes`].
    pub fn agents(&self) -> &[&'a A] {
        &self.agents
    }

    /// The edges leading to each neighbor, in the same order as [`Neighborhood::nodes`].
    pub fn edges(&self) -> &[&'a Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Data in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingData {
    /// The node deciding what happens to this data next.
    pub node: EntityId,
    /// Nodes already visited, oldest first.
    pub backtrace: Vec<EntityId>,
    pub amount: f64,
}

/// A discrete-time routing simulation over a borrowed topology.
#[derive(Debug)]
pub struct Simulation<'a, A> {
    topology: &'a Topology,
    agents: FxHashMap<EntityId, A>,
    gateways: Vec<EntityId>,
    now: Ticks,
    pending: Vec<PendingData>,
    stats: Stats,
}

impl<'a, A: Agent> Simulation<'a, A> {
    /// Creates a simulation, calling `factory` once for every node of `topology`.
    pub fn new<F>(topology: &'a Topology, mut factory: F) -> Self
    where
        F: FnMut(&Topology, &Node) -> A,
    {
        let agents = topology
            .nodes()
            .map(|node| (node.id(), factory(topology, node)))
            .collect();
        let gateways = topology.gateways().map(|s| s.id.global).collect();
        Self {
            topology,
            agents,
            gateways,
            now: Ticks::ZERO,
            pending: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Advances the simulation by one tick. `dt` is only passed on to the agents.
    ///
    /// After an error the simulation is left in an unspecified state and should be discarded.
    pub fn step(&mut self, dt: f64) -> Result<(), SimError> {
        let topology = self.topology;
        let agents = &self.agents;

        // Ingress
        for &gateway in &self.gateways {
            let node = topology.node(gateway).ok_or(SimError::UnknownNode(gateway))?;
            let agent = agents.get(&gateway).ok_or(SimError::UnknownNode(gateway))?;
            let amount = agent.generate_inbound_data(node, dt);
            if amount != 0.0 {
                self.stats.record_generated(amount);
                self.pending.push(PendingData {
                    node: gateway,
                    backtrace: Vec::new(),
                    amount,
                });
            }
        }

        // Advance everything in flight, including what just entered
        let pending = std::mem::take(&mut self.pending);
        let mut advanced = Vec::with_capacity(pending.len());
        for mut data in pending {
            let id = data.node;
            let node = topology.node(id).ok_or(SimError::UnknownNode(id))?;
            let agent = agents.get(&id).ok_or(SimError::UnknownNode(id))?;
            match node {
                Node::Switch(_) => {
                    let neighborhood = Neighborhood::collect(topology, agents, id, |n| {
                        !data.backtrace.contains(&n)
                    })?;
                    if neighborhood.is_empty() {
                        debug!(
                            "{}: dropping {} at dead end {} after {} hops",
                            self.now,
                            data.amount,
                            node.name(),
                            data.backtrace.len()
                        );
                        self.stats.record_undelivered(data.amount);
                        continue;
                    }
                    let index = agent.next_hop(node, &neighborhood, dt);
                    let next = neighborhood.nodes().get(index).copied().ok_or(
                        SimError::InvalidHop {
                            node: id,
                            index,
                            nr_choices: neighborhood.len(),
                        },
                    )?;
                    self.stats.record_transfer(id, next, data.amount);
                    data.backtrace.push(id);
                    data.node = next;
                    advanced.push(data);
                }
                Node::Host(_) | Node::Container(_) => {
                    let neighborhood = Neighborhood::collect(topology, agents, id, |_| true)?;
                    let processed =
                        agent.processed_data_amount(node, &neighborhood, dt, data.amount);
                    // Also rejects NaN
                    if !(0.0..=data.amount).contains(&processed) {
                        return Err(SimError::InvalidProcessed {
                            node: id,
                            arrived: data.amount,
                            processed,
                        });
                    }
                    self.stats.record_processed(id, data.amount, processed);
                }
            }
        }
        self.pending = advanced;
        self.now += Ticks::ONE;
        Ok(())
    }

    /// Steps the simulation until the clock reaches `t_end`.
    pub fn run(&mut self, dt: f64, t_end: Ticks) -> Result<(), SimError> {
        while self.now < t_end {
            self.step(dt)?;
        }
        info!(
            "Simulated {}: generated {}, processed {}, lost {}, undelivered {}, in flight {}",
            self.now,
            self.stats.generated(),
            self.stats.total_processed(),
            self.stats.lost(),
            self.stats.undelivered(),
            self.in_flight(),
        );
        Ok(())
    }

    /// The number of steps taken so far.
    pub fn now(&self) -> Ticks {
        self.now
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn into_stats(self) -> Stats {
        self.stats
    }

    /// Data still in flight.
    pub fn pending(&self) -> &[PendingData] {
        &self.pending
    }

    /// The total amount of data still in flight.
    pub fn in_flight(&self) -> f64 {
        self.pending.iter().map(|d| d.amount).sum()
    }

    pub fn agent(&self, node: EntityId) -> Option<&A> {
        self.agents.get(&node)
    }

    pub fn topology(&self) -> &'a Topology {
        self.topology
    }
}

/// Simulation error.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An agent chose a neighbor that does not exist.
    #[error("agent of node {node} chose neighbor {index} out of {nr_choices}")]
    InvalidHop {
        /// The deciding node.
        node: EntityId,
        /// The returned index.
        index: usize,
        /// The number of neighbors the agent could choose from.
        nr_choices: usize,
    },

    /// An agent processed a negative amount or more than arrived.
    #[error("agent of node {node} processed {processed} out of {arrived}")]
    InvalidProcessed {
        /// The processing node.
        node: EntityId,
        /// The amount that arrived.
        arrived: f64,
        /// The returned amount.
        processed: f64,
    },

    /// A node is missing from the topology.
    #[error("node {0} is not part of the topology")]
    UnknownNode(EntityId),
}
