use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::network::types::{Container, Edge, Host, Node, NodeKind, OverlayId, Switch};
use crate::registry::EntityId;

/// An undirected graph of hosts, switches and containers, joined by physical links and
/// deployments.
///
/// Nodes and edges are keyed by their global IDs and enumerate in ID order, which is also the
/// order they were created in. Neighbors enumerate in the order they were connected.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: BTreeMap<EntityId, Node>,
    edges: BTreeMap<EntityId, Edge>,
    // Incident edge IDs of every node
    adjacency: FxHashMap<EntityId, Vec<EntityId>>,
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `a` and `b` with `relationship`, registering whichever endpoints are not yet part
    /// of the topology. Returns the ID of the new edge.
    ///
    /// Nothing is modified if this function returns an error.
    ///
    /// Correctness properties:
    ///
    /// - `relationship` must join exactly `a` and `b`, which must be distinct.
    /// - An already registered ID must refer to the same payload.
    /// - Physical links join hosts and switches only.
    /// - A deployment joins a container to the host named by the container, and every
    ///   container has exactly one deployment.
    /// - Edge IDs must be unique, and there is at most one edge between any two nodes.
    pub fn connect(
        &mut self,
        a: impl Into<Node>,
        b: impl Into<Node>,
        relationship: impl Into<Edge>,
    ) -> Result<EntityId, TopologyError> {
        let (a, b, edge) = (a.into(), b.into(), relationship.into());
        let (ida, idb, eid) = (a.id(), b.id(), edge.id());
        // CORRECTNESS: `relationship` must join exactly `a` and `b`, which must be distinct.
        if ida == idb {
            return Err(TopologyError::NodeAdjacentSelf(ida));
        }
        if !edge.connects(ida, idb) {
            return Err(TopologyError::MismatchedEndpoints {
                edge: eid,
                a: ida,
                b: idb,
            });
        }
        // CORRECTNESS: An already registered ID must refer to the same payload.
        for node in [&a, &b] {
            if let Some(existing) = self.nodes.get(&node.id()) {
                if existing != node {
                    return Err(TopologyError::ConflictingNode(node.id()));
                }
            }
        }
        if self.nodes.contains_key(&eid) {
            return Err(TopologyError::ConflictingNode(eid));
        }
        match &edge {
            // CORRECTNESS: Physical links join hosts and switches only.
            Edge::PhysicalLink(_) => {
                for node in [&a, &b] {
                    if matches!(node.kind(), NodeKind::Container) {
                        return Err(TopologyError::ContainerLink {
                            edge: eid,
                            container: node.id(),
                        });
                    }
                }
            }
            // CORRECTNESS: A deployment joins a container to the host named by the container,
            // and every container has exactly one deployment.
            Edge::Deployment(d) => {
                let container = [&a, &b]
                    .into_iter()
                    .find_map(|n| n.as_container().filter(|c| c.id.global == d.container));
                let host = [&a, &b]
                    .into_iter()
                    .find_map(|n| n.as_host().filter(|h| h.id.global == d.host));
                match (container, host) {
                    (Some(c), Some(_)) if c.host() == d.host => {}
                    _ => return Err(TopologyError::InvalidDeployment(eid)),
                }
                if self.host_of(d.container).is_some() {
                    return Err(TopologyError::AlreadyDeployed(d.container));
                }
            }
        }
        // CORRECTNESS: Edge IDs must be unique, and there is at most one edge between any two
        // nodes.
        if self.edges.contains_key(&eid) {
            return Err(TopologyError::DuplicateEdgeId(eid));
        }
        if self.edge_between(ida, idb).is_some() {
            return Err(TopologyError::DuplicateEdge { a: ida, b: idb });
        }
        self.insert_node(a);
        self.insert_node(b);
        self.adjacency.entry(ida).or_default().push(eid);
        self.adjacency.entry(idb).or_default().push(eid);
        self.edges.insert(eid, edge);
        Ok(eid)
    }

    /// Registers a node without connecting it. Returns `false` if the ID was already taken.
    pub(crate) fn insert_node(&mut self, node: Node) -> bool {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(id, node);
        self.adjacency.entry(id).or_default();
        true
    }

    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EntityId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the edges incident to `node`, in the order they were connected.
    pub fn incident_edges(&self, node: EntityId) -> impl Iterator<Item = &Edge> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|eid| self.edges.get(eid))
    }

    /// Returns the neighbors of `node` together with the edges leading to them, in the order
    /// they were connected.
    pub fn neighbors(&self, node: EntityId) -> impl Iterator<Item = (EntityId, &Edge)> + '_ {
        self.incident_edges(node)
            .filter_map(move |e| e.other(node).map(|n| (n, e)))
    }

    pub fn edge_between(&self, a: EntityId, b: EntityId) -> Option<&Edge> {
        self.incident_edges(a).find(|e| e.connects(a, b))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> + '_ {
        self.nodes().filter_map(Node::as_host)
    }

    pub fn switches(&self) -> impl Iterator<Item = &Switch> + '_ {
        self.nodes().filter_map(Node::as_switch)
    }

    pub fn gateways(&self) -> impl Iterator<Item = &Switch> + '_ {
        self.switches().filter(|s| s.is_gateway)
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> + '_ {
        self.nodes().filter_map(Node::as_container)
    }

    /// Returns the containers deployed on `host`.
    pub fn containers_on(&self, host: EntityId) -> impl Iterator<Item = &Container> + '_ {
        self.incident_edges(host).filter_map(move |e| match e {
            Edge::Deployment(d) if d.host == host => {
                self.node(d.container).and_then(Node::as_container)
            }
            _ => None,
        })
    }

    /// Returns the host `container` is deployed on.
    pub fn host_of(&self, container: EntityId) -> Option<&Host> {
        self.incident_edges(container).find_map(|e| match e {
            Edge::Deployment(d) if d.container == container => {
                self.node(d.host).and_then(Node::as_host)
            }
            _ => None,
        })
    }

    /// Returns the containers of an overlay.
    pub fn overlay_members(&self, overlay: OverlayId) -> impl Iterator<Item = &Container> + '_ {
        self.containers()
            .filter(move |c| c.overlay() == Some(overlay))
    }

    delegate::delegate! {
        to self.nodes {
            #[call(values)]
            pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_;

            #[call(len)]
            pub fn nr_nodes(&self) -> usize;
        }

        to self.edges {
            #[call(values)]
            pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_;

            #[call(len)]
            pub fn nr_edges(&self) -> usize;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("node {0} is connected to itself")]
    NodeAdjacentSelf(EntityId),

    #[error("edge {edge} does not join nodes {a} and {b}")]
    MismatchedEndpoints {
        edge: EntityId,
        a: EntityId,
        b: EntityId,
    },

    #[error("ID {0} is already registered with a different payload")]
    ConflictingNode(EntityId),

    #[error("duplicate edge ID {0}")]
    DuplicateEdgeId(EntityId),

    #[error("duplicate edges between {a} and {b}")]
    DuplicateEdge { a: EntityId, b: EntityId },

    #[error("physical link {edge} is attached to container {container}")]
    ContainerLink { edge: EntityId, container: EntityId },

    #[error("deployment {0} does not join a container to its host")]
    InvalidDeployment(EntityId),

    #[error("container {0} is already deployed")]
    AlreadyDeployed(EntityId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ipv4Prefix;
    use crate::network::types::{Deployment, PhysicalLink};
    use crate::registry::Registry;
    use crate::testing::{self, BANDWIDTH};

    struct Fixture {
        registry: Registry,
        topology: Topology,
        host: Host,
        switch: Switch,
    }

    fn fixture() -> anyhow::Result<Fixture> {
        let mut registry = Registry::new();
        let host = Host::new(&mut registry, Ipv4Prefix::default())?;
        let switch = Switch::new(&mut registry, true);
        Ok(Fixture {
            registry,
            topology: Topology::new(),
            host,
            switch,
        })
    }

    #[test]
    fn empty_topology_has_nothing() {
        let topology = Topology::new();
        assert_eq!(topology.nr_nodes(), 0);
        assert_eq!(topology.nr_edges(), 0);
        assert_eq!(topology.neighbors(EntityId::ZERO).count(), 0);
    }

    #[test]
    fn connect_registers_endpoints() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let link = PhysicalLink::new(&mut registry, switch.id.global, host.id.global, BANDWIDTH);
        let eid = topology.connect(switch.clone(), host.clone(), link)?;
        assert_eq!(topology.nr_nodes(), 2);
        assert_eq!(topology.nr_edges(), 1);
        assert_eq!(eid, link.id.global);
        assert_eq!(
            topology.node(host.id.global).and_then(Node::as_host),
            Some(&host)
        );
        let neighbors = topology
            .neighbors(switch.id.global)
            .map(|(n, _)| n)
            .collect::<Vec<_>>();
        assert_eq!(neighbors, vec![host.id.global]);
        assert!(topology.edge_between(host.id.global, switch.id.global).is_some());
        Ok(())
    }

    #[test]
    fn neighbors_follow_connection_order() -> anyhow::Result<()> {
        let (topology, ids) = testing::fork_topology()?;
        let neighbors = topology
            .neighbors(ids.gateway)
            .map(|(n, _)| n)
            .collect::<Vec<_>>();
        assert_eq!(neighbors, vec![ids.left, ids.right, ids.hosts[0]]);
        Ok(())
    }

    #[test]
    fn node_adjacent_self_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            switch,
            ..
        } = fixture()?;
        let link = PhysicalLink::new(&mut registry, switch.id.global, switch.id.global, BANDWIDTH);
        let res = topology.connect(switch.clone(), switch, link);
        assert!(matches!(res, Err(TopologyError::NodeAdjacentSelf(..))));
        assert_eq!(topology.nr_nodes(), 0);
        Ok(())
    }

    #[test]
    fn mismatched_endpoints_fail() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let other = Switch::new(&mut registry, false);
        let link = PhysicalLink::new(&mut registry, other.id.global, host.id.global, BANDWIDTH);
        let res = topology.connect(switch, host, link);
        assert!(matches!(res, Err(TopologyError::MismatchedEndpoints { .. })));
        Ok(())
    }

    #[test]
    fn duplicate_edges_fail() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let l1 = PhysicalLink::new(&mut registry, switch.id.global, host.id.global, BANDWIDTH);
        let l2 = PhysicalLink::new(&mut registry, host.id.global, switch.id.global, BANDWIDTH);
        topology.connect(switch.clone(), host.clone(), l1)?;
        let res = topology.connect(host.clone(), switch.clone(), l2);
        assert!(matches!(res, Err(TopologyError::DuplicateEdge { .. })));
        let other = Switch::new(&mut registry, false);
        let l3 = PhysicalLink {
            a: other.id.global,
            b: switch.id.global,
            ..l1
        };
        let res = topology.connect(other, switch, l3);
        assert!(matches!(res, Err(TopologyError::DuplicateEdgeId(..))));
        assert_eq!(topology.nr_edges(), 1);
        Ok(())
    }

    #[test]
    fn conflicting_node_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let link = PhysicalLink::new(&mut registry, switch.id.global, host.id.global, BANDWIDTH);
        topology.connect(switch.clone(), host.clone(), link)?;
        let other_host = Host::new(&mut registry, Ipv4Prefix::default())?;
        let impostor = Switch {
            is_gateway: false,
            ..switch
        };
        let link = PhysicalLink::new(
            &mut registry,
            impostor.id.global,
            other_host.id.global,
            BANDWIDTH,
        );
        let res = topology.connect(impostor, other_host, link);
        assert!(matches!(res, Err(TopologyError::ConflictingNode(..))));
        assert_eq!(topology.nr_nodes(), 2);
        Ok(())
    }

    #[test]
    fn container_link_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let container = Container::new(&mut registry, &host, "web");
        let link = PhysicalLink::new(
            &mut registry,
            switch.id.global,
            container.id.global,
            BANDWIDTH,
        );
        let res = topology.connect(switch, container, link);
        assert!(matches!(res, Err(TopologyError::ContainerLink { .. })));
        Ok(())
    }

    #[test]
    fn deployment_to_wrong_host_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            ..
        } = fixture()?;
        let other_host = Host::new(&mut registry, Ipv4Prefix::default())?;
        let container = Container::new(&mut registry, &host, "web");
        let mut deployment = Deployment::new(&mut registry, &container);
        deployment.host = other_host.id.global;
        let res = topology.connect(container, other_host, deployment);
        assert!(matches!(res, Err(TopologyError::InvalidDeployment(..))));
        Ok(())
    }

    #[test]
    fn deployment_to_switch_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let container = Container::new(&mut registry, &host, "web");
        let mut deployment = Deployment::new(&mut registry, &container);
        deployment.host = switch.id.global;
        let res = topology.connect(container, switch, deployment);
        assert!(matches!(res, Err(TopologyError::InvalidDeployment(..))));
        Ok(())
    }

    #[test]
    fn second_deployment_fails() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            ..
        } = fixture()?;
        let container = Container::new(&mut registry, &host, "web");
        let first = Deployment::new(&mut registry, &container);
        let second = Deployment::new(&mut registry, &container);
        topology.connect(container.clone(), host.clone(), first)?;
        let res = topology.connect(container.clone(), host, second);
        assert!(matches!(
            res,
            Err(TopologyError::AlreadyDeployed(id)) if id == container.id.global
        ));
        assert_eq!(topology.nr_edges(), 1);
        Ok(())
    }

    #[test]
    fn deployment_queries() -> anyhow::Result<()> {
        let Fixture {
            mut registry,
            mut topology,
            host,
            switch,
        } = fixture()?;
        let link = PhysicalLink::new(&mut registry, switch.id.global, host.id.global, BANDWIDTH);
        topology.connect(switch, host.clone(), link)?;
        let web = Container::new_overlay(&mut registry, &host, "web", OverlayId::ZERO);
        let db = Container::new_overlay(&mut registry, &host, "db", OverlayId::ONE);
        for c in [&web, &db] {
            let d = Deployment::new(&mut registry, c);
            topology.connect(c.clone(), host.clone(), d)?;
        }
        let on_host = topology
            .containers_on(host.id.global)
            .map(|c| c.image())
            .collect::<Vec<_>>();
        assert_eq!(on_host, vec!["web", "db"]);
        assert_eq!(topology.host_of(db.id.global), Some(&host));
        assert_eq!(topology.host_of(host.id.global), None);
        let members = topology
            .overlay_members(OverlayId::ONE)
            .map(|c| c.id.global)
            .collect::<Vec<_>>();
        assert_eq!(members, vec![db.id.global]);
        assert_eq!(topology.gateways().count(), 1);
        Ok(())
    }
}
