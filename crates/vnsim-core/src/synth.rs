//! This module synthesizes [`Topology`]s from a handful of counts ([`SynthOpts`]).
//!
//! Synthesis runs in three phases:
//!
//! 1. Switches are arranged in a shallow tree with a fixed hop budget.
//! 2. Hosts are attached to switches in contiguous blocks.
//! 3. Containers are spread over overlays so that every overlay gets one container of each image
//!    before any overlay gets a second one, and then each overlay's containers are spread over
//!    distinct hosts.

use std::env::{self, VarError};

use itertools::Itertools;
use log::{debug, info};

use crate::config::{ConfigError, Ipv4Prefix, IP4_NETWORK_VAR};
use crate::network::{
    Container, Deployment, EntityError, Host, OverlayId, PhysicalLink, ResourceLimits, Switch,
    Topology, TopologyError,
};
use crate::registry::Registry;
use crate::units::BitsPerSec;

/// The number of hops between the root of the switch tree and its deepest switches.
pub const TREE_HOPS: u32 = 2;

/// The nominal capacity given to every synthesized link unless configured otherwise.
pub const DEFAULT_LINK_BANDWIDTH: BitsPerSec = BitsPerSec::new(10);

/// Synthesis options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct SynthOpts {
    /// Total number of switches, gateways included.
    #[builder(default)]
    pub n_switches: usize,
    /// Number of gateway switches. These are the first `n_gateways` switches created.
    #[builder(default)]
    pub n_gateways: usize,
    /// Number of hosts.
    #[builder(default)]
    pub n_hosts: usize,
    /// Container images, in the order they are distributed over overlays.
    #[builder(default)]
    pub images: Vec<ImageSpec>,
    /// Number of overlay networks.
    #[builder(default)]
    pub n_overlays: usize,
    /// Bandwidth of every synthesized link.
    #[builder(default = DEFAULT_LINK_BANDWIDTH, setter(into))]
    pub link_bandwidth: BitsPerSec,
    /// Network host addresses are derived from. Read from the environment if unset.
    #[builder(default, setter(strip_option))]
    pub ip4_network: Option<Ipv4Prefix>,
}

impl SynthOpts {
    /// The total number of containers to place.
    pub fn nr_containers(&self) -> usize {
        self.images.iter().map(|i| i.count).sum()
    }

    /// Validates the options, so that synthesis either fails up front or completes.
    ///
    /// Correctness properties:
    ///
    /// - There are at most as many gateways as switches.
    /// - Image names are unique.
    /// - If there are containers, there are overlays and hosts to place them on.
    pub fn validate(&self) -> Result<(), SynthError> {
        // CORRECTNESS: There are at most as many gateways as switches.
        if self.n_gateways > self.n_switches {
            return Err(SynthError::TooManyGateways {
                gateways: self.n_gateways,
                switches: self.n_switches,
            });
        }
        // CORRECTNESS: Image names are unique.
        if let Some(name) = self.images.iter().map(|i| &i.name).duplicates().next() {
            return Err(SynthError::DuplicateImage(name.clone()));
        }
        // CORRECTNESS: If there are containers, there are overlays and hosts to place them on.
        let containers = self.nr_containers();
        if containers > 0 && self.n_overlays == 0 {
            return Err(SynthError::NoOverlays { containers });
        }
        if containers > 0 && self.n_hosts == 0 {
            return Err(SynthError::NoHosts { containers });
        }
        Ok(())
    }
}

/// A container image and how many containers run it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub name: String,
    pub count: usize,
    /// Startup command of every container running this image.
    pub command: Option<String>,
    pub limits: ResourceLimits,
}

impl ImageSpec {
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
            command: None,
            limits: ResourceLimits::UNCONSTRAINED,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builds image specifications from `(name, count)` pairs, preserving their order.
    pub fn from_counts<I, S>(counts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        counts
            .into_iter()
            .map(|(name, count)| Self::new(name, count))
            .collect()
    }
}

/// The result of a synthesis: the topology and the registry its entities were drawn from.
#[derive(Debug)]
pub struct Synthesized {
    pub topology: Topology,
    pub registry: Registry,
}

/// Synthesizes a topology. Nothing is returned unless every phase completes.
pub fn synthesize(opts: &SynthOpts) -> Result<Synthesized, SynthError> {
    synthesize_with_env(opts, || env::var(IP4_NETWORK_VAR))
}

/// Synthesizes a topology, calling `lookup` for the host network if `opts` leaves it unset.
pub(crate) fn synthesize_with_env(
    opts: &SynthOpts,
    lookup: impl FnOnce() -> Result<String, VarError>,
) -> Result<Synthesized, SynthError> {
    opts.validate()?;
    let network = match opts.ip4_network {
        Some(network) => network,
        None => Ipv4Prefix::from_var(lookup())?,
    };
    // Host `n` takes address `n + 1`
    if opts.n_hosts as u64 >= network.size() {
        return Err(SynthError::AddressSpace {
            hosts: opts.n_hosts,
            network,
        });
    }

    let mut registry = Registry::new();
    let mut topology = Topology::new();
    let switches = build_switch_tree(&mut registry, &mut topology, opts)?;
    let hosts = attach_hosts(&mut registry, &mut topology, &switches, network, opts)?;
    let overlays = assign_overlays(&opts.images, opts.n_overlays);
    place_containers(&mut registry, &mut topology, &hosts, overlays, &opts.images)?;

    info!(
        "Synthesized {} switches ({} gateways), {} hosts and {} containers in {} overlays on {}",
        switches.len(),
        opts.n_gateways,
        hosts.len(),
        opts.nr_containers(),
        opts.n_overlays,
        network,
    );
    Ok(Synthesized { topology, registry })
}

/// Returns the smallest `a` such that `a^hops >= n`, and at least 1.
pub(crate) fn branching_factor(n: usize, hops: u32) -> usize {
    let covers = |a: usize| a.checked_pow(hops).map_or(true, |p| p >= n);
    let mut a = (n as f64).powf(1.0 / f64::from(hops)).ceil() as usize;
    // Correct for floating point error in either direction
    while a > 1 && covers(a - 1) {
        a -= 1;
    }
    while !covers(a) {
        a += 1;
    }
    a.max(1)
}

fn build_switch_tree(
    registry: &mut Registry,
    topology: &mut Topology,
    opts: &SynthOpts,
) -> Result<Vec<Switch>, SynthError> {
    let switches = (0..opts.n_switches)
        .map(|i| Switch::new(registry, i < opts.n_gateways))
        .collect::<Vec<_>>();
    let Some(root) = switches.first() else {
        return Ok(switches);
    };
    topology.insert_node(root.clone().into());

    let branching = branching_factor(switches.len(), TREE_HOPS);
    // Depth-first expansion. Entries are (switch, remaining children, depth).
    let mut stack = vec![(0, branching, 0)];
    for child in 1..switches.len() {
        while matches!(stack.last(), Some(&(_, 0, _))) {
            stack.pop();
        }
        // A tree of `TREE_HOPS` levels with this branching factor has room for every switch
        let (parent, budget, depth) = stack
            .last_mut()
            .expect("switch tree ran out of parents");
        *budget -= 1;
        let (parent, depth) = (*parent, *depth + 1);
        let (p, c) = (&switches[parent], &switches[child]);
        let link = PhysicalLink::new(registry, p.id.global, c.id.global, opts.link_bandwidth);
        topology.connect(p.clone(), c.clone(), link)?;
        debug!("Attached switch {} under {}", c.name(), p.name());
        let fresh = if depth < TREE_HOPS { branching } else { 0 };
        stack.push((child, fresh, depth));
    }
    Ok(switches)
}

fn attach_hosts(
    registry: &mut Registry,
    topology: &mut Topology,
    switches: &[Switch],
    network: Ipv4Prefix,
    opts: &SynthOpts,
) -> Result<Vec<Host>, SynthError> {
    let hosts = (0..opts.n_hosts)
        .map(|_| Host::new(registry, network))
        .collect::<Result<Vec<_>, _>>()?;
    if switches.is_empty() {
        // Nothing to attach to; the hosts stay unconnected
        for host in &hosts {
            topology.insert_node(host.clone().into());
        }
        return Ok(hosts);
    }
    let per_switch = div_ceil(hosts.len(), switches.len());
    for (n, host) in hosts.iter().enumerate() {
        let switch = &switches[n / per_switch];
        let link = PhysicalLink::new(
            registry,
            switch.id.global,
            host.id.global,
            opts.link_bandwidth,
        );
        topology.connect(switch.clone(), host.clone(), link)?;
        debug!(
            "Attached host {} ({}) to {}",
            host.name(),
            host.ip4_addr(),
            switch.name()
        );
    }
    Ok(hosts)
}

/// Returns, for every overlay, the indices into `images` of the containers it receives.
pub(crate) fn assign_overlays(images: &[ImageSpec], n_overlays: usize) -> Vec<Vec<usize>> {
    let mut overlays = vec![Vec::new(); n_overlays];
    let mut remaining = images.iter().map(|i| i.count).collect::<Vec<_>>();
    let mut unassigned = remaining.iter().sum::<usize>();
    assert!(
        unassigned == 0 || n_overlays > 0,
        "containers cannot be assigned without overlays"
    );
    while unassigned > 0 {
        for (image, left) in remaining.iter_mut().enumerate() {
            for pending in overlays.iter_mut() {
                if *left == 0 {
                    break;
                }
                pending.push(image);
                *left -= 1;
                unassigned -= 1;
            }
        }
    }
    overlays
}

fn place_containers(
    registry: &mut Registry,
    topology: &mut Topology,
    hosts: &[Host],
    mut overlays: Vec<Vec<usize>>,
    images: &[ImageSpec],
) -> Result<(), SynthError> {
    let mut unplaced = overlays.iter().map(Vec::len).sum::<usize>();
    assert!(
        unplaced == 0 || !hosts.is_empty(),
        "containers cannot be placed without hosts"
    );
    while unplaced > 0 {
        for (overlay, pending) in overlays.iter_mut().enumerate() {
            for host in hosts {
                let Some(image) = pending.pop() else {
                    break;
                };
                let spec = &images[image];
                let overlay = OverlayId::new(overlay);
                let mut container = Container::new_overlay(registry, host, &spec.name, overlay)
                    .with_limits(spec.limits);
                if let Some(command) = &spec.command {
                    container = container.with_command(command.clone());
                }
                let deployment = Deployment::new(registry, &container);
                debug!(
                    "Deploying {} ({}) on {}",
                    container.name(),
                    container.deployment_name(),
                    host.name()
                );
                topology.connect(container, host.clone(), deployment)?;
                unplaced -= 1;
            }
        }
    }
    Ok(())
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Synthesis error.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// More gateways than switches were requested.
    #[error("{gateways} gateways requested but there are only {switches} switches")]
    TooManyGateways {
        /// Requested gateways.
        gateways: usize,
        /// Total switches.
        switches: usize,
    },

    /// Two images share a name.
    #[error("duplicate image {0:?}")]
    DuplicateImage(String),

    /// There are containers but no overlays to assign them to.
    #[error("{containers} containers cannot be assigned to zero overlays")]
    NoOverlays {
        /// Containers to place.
        containers: usize,
    },

    /// There are containers but no hosts to place them on.
    #[error("{containers} containers cannot be placed on zero hosts")]
    NoHosts {
        /// Containers to place.
        containers: usize,
    },

    /// The network cannot address every host.
    #[error("network {network} cannot address {hosts} hosts")]
    AddressSpace {
        /// Requested hosts.
        hosts: usize,
        /// The host network.
        network: Ipv4Prefix,
    },

    /// The environment holds an invalid configuration.
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    /// An entity could not be created.
    #[error("failed to create entity")]
    Entity(#[from] EntityError),

    /// The topology rejected an edge.
    #[error("invalid topology")]
    Topology(#[from] TopologyError),
}
