use std::net::Ipv4Addr;

use crate::config::Ipv4Prefix;
use crate::registry::{EntityId, EntityKind, Identity, LocalId, Registry};
use crate::units::BitsPerSec;

identifier!(OverlayId, usize);

/// A graph node payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Node {
    Host(Host),
    Switch(Switch),
    Container(Container),
}

impl Node {
    pub fn id(&self) -> EntityId {
        self.identity().global
    }

    pub fn identity(&self) -> Identity {
        match self {
            Node::Host(h) => h.id,
            Node::Switch(s) => s.id,
            Node::Container(c) => c.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Host(_) => NodeKind::Host,
            Node::Switch(_) => NodeKind::Switch,
            Node::Container(_) => NodeKind::Container,
        }
    }

    /// The name the deployment layer gives this node.
    pub fn name(&self) -> String {
        match self {
            Node::Host(h) => h.name(),
            Node::Switch(s) => s.name(),
            Node::Container(c) => c.name(),
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Node::Switch(s) if s.is_gateway)
    }

    pub fn as_host(&self) -> Option<&Host> {
        match self {
            Node::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Switch> {
        match self {
            Node::Switch(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum NodeKind {
    Host,
    Switch,
    Container,
}

/// A physical machine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Host {
    pub id: Identity,
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Host {
    /// Creates a host whose address is the `local + 1`th address of `network`, so that host 0
    /// never takes the network address.
    pub fn new(registry: &mut Registry, network: Ipv4Prefix) -> Result<Self, EntityError> {
        let id = registry.allocate(EntityKind::Host);
        let n = id.local.inner() as u64 + 1;
        let addr = network
            .nth(n)
            .ok_or(EntityError::AddressExhausted { host: id.local, network })?;
        Ok(Self {
            id,
            addr,
            prefix_len: network.prefix_len(),
        })
    }

    pub fn ip4_addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn ip4_prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn name(&self) -> String {
        format!("h{}", self.id.local)
    }
}

/// A physical switch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Switch {
    pub id: Identity,
    /// Whether external traffic enters and leaves the network through this switch.
    pub is_gateway: bool,
}

impl Switch {
    pub fn new(registry: &mut Registry, is_gateway: bool) -> Self {
        Self {
            id: registry.allocate(EntityKind::Switch),
            is_gateway,
        }
    }

    pub fn name(&self) -> String {
        format!("s{}", self.id.local)
    }
}

/// Fractions of a host's resources a container may use. `1.0` means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawLimits")]
pub struct ResourceLimits {
    cpu: f64,
    net_bandwidth: f64,
    storage_bandwidth: f64,
}

impl ResourceLimits {
    pub const UNCONSTRAINED: ResourceLimits = ResourceLimits {
        cpu: 1.0,
        net_bandwidth: 1.0,
        storage_bandwidth: 1.0,
    };

    pub fn new(cpu: f64, net_bandwidth: f64, storage_bandwidth: f64) -> Result<Self, EntityError> {
        for value in [cpu, net_bandwidth, storage_bandwidth] {
            // Also rejects NaN
            if !(0.0..=1.0).contains(&value) {
                return Err(EntityError::InvalidFraction(value));
            }
        }
        Ok(Self {
            cpu,
            net_bandwidth,
            storage_bandwidth,
        })
    }

    pub fn cpu(&self) -> f64 {
        self.cpu
    }

    pub fn net_bandwidth(&self) -> f64 {
        self.net_bandwidth
    }

    pub fn storage_bandwidth(&self) -> f64 {
        self.storage_bandwidth
    }
}

#[derive(serde::Deserialize)]
struct RawLimits {
    cpu: f64,
    net_bandwidth: f64,
    storage_bandwidth: f64,
}

impl TryFrom<RawLimits> for ResourceLimits {
    type Error = EntityError;

    fn try_from(raw: RawLimits) -> Result<Self, Self::Error> {
        Self::new(raw.cpu, raw.net_bandwidth, raw.storage_bandwidth)
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::UNCONSTRAINED
    }
}

/// A virtualized workload running on exactly one host.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Container {
    pub id: Identity,
    host: EntityId,
    image: String,
    command: Option<String>,
    overlay: Option<OverlayId>,
    limits: ResourceLimits,
}

impl Container {
    /// Creates a container that belongs to no overlay.
    pub fn new(registry: &mut Registry, host: &Host, image: impl Into<String>) -> Self {
        Self::build(registry, EntityKind::Container, host, image, None)
    }

    /// Creates a container in `overlay`. It may only communicate with containers in the same
    /// overlay.
    pub fn new_overlay(
        registry: &mut Registry,
        host: &Host,
        image: impl Into<String>,
        overlay: OverlayId,
    ) -> Self {
        Self::build(
            registry,
            EntityKind::OverlayContainer,
            host,
            image,
            Some(overlay),
        )
    }

    fn build(
        registry: &mut Registry,
        kind: EntityKind,
        host: &Host,
        image: impl Into<String>,
        overlay: Option<OverlayId>,
    ) -> Self {
        Self {
            id: registry.allocate(kind),
            host: host.id.global,
            image: image.into(),
            command: None,
            overlay,
            limits: ResourceLimits::UNCONSTRAINED,
        }
    }

    /// Sets the startup command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The host this container runs on.
    pub fn host(&self) -> EntityId {
        self.host
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn overlay(&self) -> Option<OverlayId> {
        self.overlay
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Whether two containers may communicate. Containers outside any overlay only reach other
    /// containers outside any overlay.
    pub fn can_reach(&self, other: &Container) -> bool {
        self.overlay == other.overlay
    }

    pub fn name(&self) -> String {
        format!("d{}", self.id.local)
    }

    /// A name unique within a topology that also identifies the image and overlay, e.g.
    /// `database.3.17`.
    pub fn deployment_name(&self) -> String {
        match self.overlay {
            Some(overlay) => format!("{}.{}.{}", self.image, overlay, self.id.local),
            None => format!("{}.{}", self.image, self.id.local),
        }
    }
}

/// A graph edge payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Edge {
    PhysicalLink(PhysicalLink),
    Deployment(Deployment),
}

impl Edge {
    pub fn id(&self) -> EntityId {
        match self {
            Edge::PhysicalLink(l) => l.id.global,
            Edge::Deployment(d) => d.id.global,
        }
    }

    pub fn endpoints(&self) -> (EntityId, EntityId) {
        match self {
            Edge::PhysicalLink(l) => (l.a, l.b),
            Edge::Deployment(d) => (d.container, d.host),
        }
    }

    /// Returns the endpoint opposite to `node`, or `None` if `node` is not an endpoint.
    pub fn other(&self, node: EntityId) -> Option<EntityId> {
        match self.endpoints() {
            (a, b) if a == node => Some(b),
            (a, b) if b == node => Some(a),
            _ => None,
        }
    }

    pub fn connects(&self, x: EntityId, y: EntityId) -> bool {
        let (a, b) = self.endpoints();
        a == x && b == y || a == y && b == x
    }

    pub fn as_link(&self) -> Option<&PhysicalLink> {
        match self {
            Edge::PhysicalLink(l) => Some(l),
            Edge::Deployment(_) => None,
        }
    }
}

/// A bidirectional physical connection between two hosts or switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PhysicalLink {
    pub id: Identity,
    pub a: EntityId,
    pub b: EntityId,
    pub bandwidth: BitsPerSec,
}

impl PhysicalLink {
    pub fn new(
        registry: &mut Registry,
        a: EntityId,
        b: EntityId,
        bandwidth: impl Into<BitsPerSec>,
    ) -> Self {
        Self {
            id: registry.allocate(EntityKind::PhysicalLink),
            a,
            b,
            bandwidth: bandwidth.into(),
        }
    }
}

/// Marks that a container runs on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Deployment {
    pub id: Identity,
    pub container: EntityId,
    pub host: EntityId,
}

impl Deployment {
    pub fn new(registry: &mut Registry, container: &Container) -> Self {
        Self {
            id: registry.allocate(EntityKind::Deployment),
            container: container.id.global,
            host: container.host,
        }
    }
}

macro_rules! node_from {
    ($variant: ident) => {
        impl From<$variant> for Node {
            fn from(value: $variant) -> Self {
                Node::$variant(value)
            }
        }
    };
}

node_from!(Host);
node_from!(Switch);
node_from!(Container);

impl From<PhysicalLink> for Edge {
    fn from(value: PhysicalLink) -> Self {
        Edge::PhysicalLink(value)
    }
}

impl From<Deployment> for Edge {
    fn from(value: Deployment) -> Self {
        Edge::Deployment(value)
    }
}

/// Entity construction error.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// A resource fraction is outside `[0, 1]`.
    #[error("resource fraction {0} is outside [0, 1]")]
    InvalidFraction(f64),

    /// The network has no address left for a host.
    #[error("network {network} has no address for host {host}")]
    AddressExhausted {
        /// The host's local ID.
        host: LocalId,
        /// The network the address was derived from.
        network: Ipv4Prefix,
    },
}
