use std::collections::BTreeMap;

use crate::registry::EntityId;

/// Statistics accumulated over a simulation.
///
/// Transfers are counted per direction and summed when queried, so traffic from `a` to `b` and
/// from `b` to `a` contributes to the same undirected total.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stats {
    transferred: BTreeMap<(EntityId, EntityId), f64>,
    processed: BTreeMap<EntityId, f64>,
    generated: f64,
    lost: f64,
    undelivered: f64,
}

impl Stats {
    pub(crate) fn record_generated(&mut self, amount: f64) {
        self.generated += amount;
    }

    pub(crate) fn record_transfer(&mut self, from: EntityId, to: EntityId, amount: f64) {
        *self.transferred.entry((from, to)).or_default() += amount;
    }

    /// Records that `node` processed `processed` out of `arrived`. The rest is lost.
    pub(crate) fn record_processed(&mut self, node: EntityId, arrived: f64, processed: f64) {
        *self.processed.entry(node).or_default() += processed;
        self.lost += arrived - processed;
    }

    pub(crate) fn record_undelivered(&mut self, amount: f64) {
        self.undelivered += amount;
    }

    /// Data transferred between `a` and `b`, in either direction.
    pub fn transferred(&self, a: EntityId, b: EntityId) -> f64 {
        self.transferred_directed(a, b) + self.transferred_directed(b, a)
    }

    /// Data transferred from `from` to `to`.
    pub fn transferred_directed(&self, from: EntityId, to: EntityId) -> f64 {
        self.transferred.get(&(from, to)).copied().unwrap_or_default()
    }

    /// Undirected transfer totals, keyed by `(lower ID, higher ID)`.
    pub fn edge_totals(&self) -> BTreeMap<(EntityId, EntityId), f64> {
        let mut totals = BTreeMap::new();
        for (&(a, b), &amount) in &self.transferred {
            let key = if a <= b { (a, b) } else { (b, a) };
            *totals.entry(key).or_default() += amount;
        }
        totals
    }

    /// Data processed by `node`.
    pub fn processed(&self, node: EntityId) -> f64 {
        self.processed.get(&node).copied().unwrap_or_default()
    }

    /// Per-node processing totals.
    pub fn processed_totals(&self) -> impl Iterator<Item = (EntityId, f64)> + '_ {
        self.processed.iter().map(|(&node, &amount)| (node, amount))
    }

    /// Total data that entered the network through gateways.
    pub fn generated(&self) -> f64 {
        self.generated
    }

    /// Total data that arrived at terminal nodes but was not processed.
    pub fn lost(&self) -> f64 {
        self.lost
    }

    /// Total data dropped at switches with nowhere left to go.
    pub fn undelivered(&self) -> f64 {
        self.undelivered
    }

    pub fn total_processed(&self) -> f64 {
        self.processed.values().sum()
    }

    pub fn total_transferred(&self) -> f64 {
        self.transferred.values().sum()
    }

    /// Produces a serializable view of these statistics for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            edges: self
                .edge_totals()
                .into_iter()
                .map(|((a, b), amount)| EdgeTotal { a, b, amount })
                .collect(),
            processed: self
                .processed_totals()
                .map(|(node, amount)| NodeTotal { node, amount })
                .collect(),
            generated: self.generated,
            lost: self.lost,
            undelivered: self.undelivered,
        }
    }
}

/// A point-in-time copy of [`Stats`], ordered by node IDs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub edges: Vec<EdgeTotal>,
    pub processed: Vec<NodeTotal>,
    pub generated: f64,
    pub lost: f64,
    pub undelivered: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EdgeTotal {
    pub a: EntityId,
    pub b: EntityId,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeTotal {
    pub node: EntityId,
    pub amount: f64,
}
