//! This module defines the [`Registry`], which hands out identities to entities. Every entity
//! gets a global ID, unique across all entities allocated by the same registry, and a local ID,
//! unique among entities of the same [`EntityKind`].

use rustc_hash::FxHashMap;

identifier!(EntityId, usize);
identifier!(LocalId, usize);

/// The concrete entity types that draw from independent local sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum EntityKind {
    Host,
    Switch,
    Container,
    OverlayContainer,
    PhysicalLink,
    Deployment,
}

/// The identity of an entity. Assigned once at construction and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, derive_new::new,
)]
pub struct Identity {
    /// Position in the entity's type-local sequence.
    pub local: LocalId,
    /// Position in the registry-wide sequence. Graph nodes and edges are keyed by this.
    pub global: EntityId,
}

/// Sequence counters for entity identities.
///
/// Each synthesis owns its own registry, so sequences from unrelated runs never interleave.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    next_global: EntityId,
    next_local: FxHashMap<EntityKind, LocalId>,
}

impl Registry {
    /// Creates a registry whose sequences all start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next identity for an entity of the given kind.
    pub fn allocate(&mut self, kind: EntityKind) -> Identity {
        let local = self.next_local.entry(kind).or_default();
        let identity = Identity::new(*local, self.next_global);
        *local += LocalId::ONE;
        self.next_global += EntityId::ONE;
        identity
    }

    /// Returns how many identities of the given kind have been allocated.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.next_local
            .get(&kind)
            .copied()
            .unwrap_or_default()
            .inner()
    }

    /// Returns how many identities have been allocated in total.
    pub fn total(&self) -> usize {
        self.next_global.inner()
    }
}
