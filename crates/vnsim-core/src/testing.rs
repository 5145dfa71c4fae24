use crate::config::Ipv4Prefix;
use crate::network::{Container, Deployment, Host, Node, PhysicalLink, Switch, Topology};
use crate::registry::{EntityId, Registry};
use crate::sim::{Agent, Neighborhood};
use crate::units::BitsPerSec;

pub(crate) const BANDWIDTH: BitsPerSec = BitsPerSec::new(10);

pub(crate) struct ForkIds {
    pub(crate) gateway: EntityId,
    pub(crate) left: EntityId,
    pub(crate) right: EntityId,
    pub(crate) hosts: [EntityId; 4],
}

/// A gateway with two switches and a host below it. `left` has hosts 1 and 2, `right` has host 3,
/// which also runs a container.
pub(crate) fn fork_topology() -> anyhow::Result<(Topology, ForkIds)> {
    let mut registry = Registry::new();
    let gateway = Switch::new(&mut registry, true);
    let left = Switch::new(&mut registry, false);
    let right = Switch::new(&mut registry, false);
    let hosts = (0..4)
        .map(|_| Host::new(&mut registry, Ipv4Prefix::default()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut topology = Topology::new();
    let links: [(Node, Node); 6] = [
        (gateway.clone().into(), left.clone().into()),
        (gateway.clone().into(), right.clone().into()),
        (gateway.clone().into(), hosts[0].clone().into()),
        (left.clone().into(), hosts[1].clone().into()),
        (left.clone().into(), hosts[2].clone().into()),
        (right.clone().into(), hosts[3].clone().into()),
    ];
    for (a, b) in links {
        let link = PhysicalLink::new(&mut registry, a.id(), b.id(), BANDWIDTH);
        topology.connect(a, b, link)?;
    }
    let container = Container::new(&mut registry, &hosts[3], "worker");
    let deployment = Deployment::new(&mut registry, &container);
    topology.connect(container, hosts[3].clone(), deployment)?;
    let ids = ForkIds {
        gateway: gateway.id.global,
        left: left.id.global,
        right: right.id.global,
        hosts: [0, 1, 2, 3].map(|i| hosts[i].id.global),
    };
    Ok((topology, ids))
}

pub(crate) struct DeadEndIds {
    pub(crate) gateway: EntityId,
    pub(crate) left: EntityId,
}

/// A gateway whose only neighbor is a switch with no other neighbors.
pub(crate) fn dead_end_topology() -> anyhow::Result<(Topology, DeadEndIds)> {
    let mut registry = Registry::new();
    let gateway = Switch::new(&mut registry, true);
    let left = Switch::new(&mut registry, false);
    let link = PhysicalLink::new(&mut registry, gateway.id.global, left.id.global, BANDWIDTH);
    let ids = DeadEndIds {
        gateway: gateway.id.global,
        left: left.id.global,
    };
    let mut topology = Topology::new();
    topology.connect(gateway, left, link)?;
    Ok((topology, ids))
}

/// Generates `rate` per unit of `dt` at gateways, always forwards to the first neighbor and
/// processes `fraction` of what arrives.
#[derive(Debug, derive_new::new)]
pub(crate) struct FirstHop {
    rate: f64,
    fraction: f64,
}

impl Agent for FirstHop {
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
