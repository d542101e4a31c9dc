//! Conduit Core -- the part/cable network engine.
//!
//! Spatially distributed parts (logical devices mounted on a position+side)
//! join shared logical networks discovered by connectivity through cable
//! nodes. This crate owns topology discovery, the network-element lifecycle
//! contract, durable-id arbitration for parts, scheduling, and persistence
//! of topology and part sets.
//!
//! # Lifecycle
//!
//! 1. **Discovery** -- [`path::discover_cluster`] flood-fills connectivity
//!    from a seed position through the host's [`path::PathOracle`].
//! 2. **Construction** -- [`network::Network::from_cluster`] builds a network
//!    whose elements are the parts mounted on the cluster's containers.
//! 3. **Initialization** -- [`network::Network::initialize`] samples each
//!    element's scheduling contract, then fires `after_network_alive` (or
//!    `after_network_re_alive` on a rebuild).
//! 4. **Ticking** -- the host tick driver calls [`network::Network::tick`];
//!    elements update when their interval elapses.
//! 5. **Kill** -- [`network::Network::kill`] fires `before_network_kill` and
//!    stops all scheduling; the next discovery builds a *new* network.
//!
//! # Identity
//!
//! Element identity is always the value key (definition hash, position,
//! side), never instance address: containers and their states can be
//! replaced wholesale (e.g. on a resync), and a rebuilt element must stand
//! in for the original. For the same reason, part elements re-resolve their
//! state through the container facade on every access instead of caching it.
//!
//! # Key Types
//!
//! - [`pos::DimPos`] / [`pos::PartPos`] -- totally ordered position keys.
//! - [`path::Cluster`] -- one connected component, persisted as positions.
//! - [`element::NetworkElement`] -- the member contract and lifecycle hooks.
//! - [`part::PartDefinition`] / [`part::PartState`] -- shared descriptor and
//!   per-instance persisted state with typed capabilities.
//! - [`container::PartContainer`] -- per-position side-to-part registry.
//! - [`network::Network`] -- membership, addressing index, scheduler.
//! - [`counter::GlobalCounters`] -- persisted durable-id source.

pub mod container;
pub mod counter;
pub mod element;
pub mod network;
pub mod part;
pub mod part_element;
pub mod path;
pub mod persist;
pub mod pos;
pub mod registry;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Ticks are the atomic unit of scheduling time.
pub type Ticks = u64;
