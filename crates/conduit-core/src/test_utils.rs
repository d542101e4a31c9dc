//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the helpers
//! are available to unit tests here and to the integration-tests crate via
//! the `test-utils` feature.

use crate::container::PartContainer;
use crate::element::NetworkError;
use crate::network::NetworkIndex;
use crate::part::{Capability, CapabilityKind, PartDefinition, PartState, PartTarget};
use crate::path::{PathElement, PathOracle};
use crate::pos::{DimPos, Side, WorldId};
use crate::world::WorldAccess;
use crate::Ticks;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// ===========================================================================
// MapWorld — in-memory world backing both collaborator seams
// ===========================================================================

/// An in-memory world: a set of cable positions (each with a container) and
/// a fixed number of known worlds. Adjacency is 6-neighborhood restricted to
/// cable positions.
#[derive(Debug, Default)]
pub struct MapWorld {
    containers: HashMap<DimPos, PartContainer>,
    cables: BTreeSet<DimPos>,
    known_worlds: u32,
}

impl MapWorld {
    pub fn new(known_worlds: u32) -> Self {
        Self {
            containers: HashMap::new(),
            cables: BTreeSet::new(),
            known_worlds,
        }
    }

    /// Add a cable at `pos`, creating its container.
    pub fn add_cable(&mut self, pos: DimPos) {
        self.cables.insert(pos);
        self.containers
            .entry(pos)
            .or_insert_with(|| PartContainer::new(pos));
    }

    /// Remove the cable and its container at `pos`.
    pub fn remove_cable(&mut self, pos: DimPos) {
        self.cables.remove(&pos);
        self.containers.remove(&pos);
    }

    /// Remove only the container, leaving the cable connectable. Used to
    /// simulate topology/world divergence.
    pub fn drop_container(&mut self, pos: DimPos) {
        self.containers.remove(&pos);
    }
}

impl WorldAccess for MapWorld {
    fn container(&self, pos: DimPos) -> Option<&PartContainer> {
        self.containers.get(&pos)
    }

    fn container_mut(&mut self, pos: DimPos) -> Option<&mut PartContainer> {
        self.containers.get_mut(&pos)
    }
}

impl PathOracle for MapWorld {
    fn neighbors(&self, pos: DimPos) -> Vec<DimPos> {
        Side::ALL
            .into_iter()
            .map(|side| pos.offset(side))
            .filter(|neighbor| self.cables.contains(neighbor))
            .collect()
    }

    fn path_element_at(&self, pos: DimPos) -> Option<PathElement> {
        self.cables.contains(&pos).then(|| PathElement::new(pos))
    }

    fn is_world_known(&self, world: WorldId) -> bool {
        world.0 < self.known_worlds
    }
}

// ===========================================================================
// ProbeDefinition — an instrumented part for scheduling/lifecycle tests
// ===========================================================================

/// A part that counts its scheduled updates in an `UpdateMeter` capability
/// and neighbor notifications in a `SignalEmitter` level.
#[derive(Debug)]
pub struct ProbeDefinition {
    name: String,
    interval: Ticks,
    rate: i64,
}

impl ProbeDefinition {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interval: 1,
            rate: 0,
        }
    }

    pub fn with_interval(mut self, interval: Ticks) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_rate(mut self, rate: i64) -> Self {
        self.rate = rate;
        self
    }
}

impl PartDefinition for ProbeDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_state(&self, counters: &mut crate::counter::GlobalCounters) -> PartState {
        let mut state = PartState::new(counters);
        state.set_update_interval(self.interval);
        self.gather_capabilities(&mut state);
        state
    }

    fn gather_capabilities(&self, state: &mut PartState) {
        state
            .capabilities_mut()
            .add(Capability::UpdateMeter { updates: 0 });
        state
            .capabilities_mut()
            .add(Capability::SignalEmitter { level: 0 });
    }

    fn wants_update(&self, _state: &PartState) -> bool {
        true
    }

    fn consumption_rate(&self, state: &PartState) -> i64 {
        if state.is_enabled() { self.rate } else { 0 }
    }

    fn update(
        &self,
        _index: &mut NetworkIndex,
        _target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        if let Some(Capability::UpdateMeter { updates }) =
            state.capabilities_mut().get_mut(CapabilityKind::UpdateMeter)
        {
            *updates += 1;
        }
        Ok(())
    }

    fn on_neighbor_change(
        &self,
        _index: &mut NetworkIndex,
        _target: &PartTarget,
        state: &mut PartState,
        _neighbor: DimPos,
    ) -> Result<(), NetworkError> {
        if let Some(Capability::SignalEmitter { level }) = state
            .capabilities_mut()
            .get_mut(CapabilityKind::SignalEmitter)
        {
            *level = level.saturating_add(1);
        }
        Ok(())
    }
}

// ===========================================================================
// Constructors and accessors
// ===========================================================================

/// A probe part named "probe" with interval 1 and no consumption.
pub fn probe() -> Arc<dyn PartDefinition> {
    Arc::new(ProbeDefinition::named("probe"))
}

pub fn probe_with_interval(interval: Ticks) -> Arc<dyn PartDefinition> {
    Arc::new(ProbeDefinition::named("probe").with_interval(interval))
}

pub fn probe_with_rate(rate: i64) -> Arc<dyn PartDefinition> {
    Arc::new(ProbeDefinition::named("probe").with_rate(rate))
}

/// Read the probe's update count at a position/side.
pub fn update_count(world: &MapWorld, pos: DimPos, side: Side) -> u64 {
    match world
        .container(pos)
        .and_then(|c| c.state(side))
        .and_then(|s| s.capabilities().get(CapabilityKind::UpdateMeter))
    {
        Some(Capability::UpdateMeter { updates }) => *updates,
        _ => 0,
    }
}
