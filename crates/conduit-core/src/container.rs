//! Part containers and the placement/removal protocol.
//!
//! A container owns the parts physically present at one position, keyed by
//! side. Placement and removal are protocols spanning the container and the
//! network, so they live here as free functions rather than methods: store
//! first, then join the network; fire the pre/post hooks around detachment.

use crate::counter::GlobalCounters;
use crate::element::{ElementKey, NetworkError};
use crate::network::Network;
use crate::part::{PartDefinition, PartState, PartTarget};
use crate::part_element::PartNetworkElement;
use crate::pos::{DimPos, PartPos, Side};
use crate::world::WorldAccess;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One mounted part: the shared definition plus its mutable state.
#[derive(Debug, Clone)]
pub struct PartEntry {
    pub definition: Arc<dyn PartDefinition>,
    pub state: PartState,
}

/// Per-position registry of the parts mounted at one location.
#[derive(Debug, Clone)]
pub struct PartContainer {
    position: DimPos,
    parts: BTreeMap<Side, PartEntry>,
    /// A real cable keeps the container load-bearing even when empty.
    real_cable: bool,
}

impl PartContainer {
    pub fn new(position: DimPos) -> Self {
        Self {
            position,
            parts: BTreeMap::new(),
            real_cable: false,
        }
    }

    pub fn position(&self) -> DimPos {
        self.position
    }

    pub fn is_real_cable(&self) -> bool {
        self.real_cable
    }

    pub fn set_real_cable(&mut self, real: bool) {
        self.real_cable = real;
    }

    pub fn has_parts(&self) -> bool {
        !self.parts.is_empty()
    }

    pub fn has_part(&self, side: Side) -> bool {
        self.parts.contains_key(&side)
    }

    /// Occupied sides, in order.
    pub fn sides(&self) -> impl Iterator<Item = Side> + '_ {
        self.parts.keys().copied()
    }

    /// Occupied sides with their entries, in side order.
    pub fn parts(&self) -> impl Iterator<Item = (Side, &PartEntry)> {
        self.parts.iter().map(|(side, entry)| (*side, entry))
    }

    pub fn part(&self, side: Side) -> Option<&PartEntry> {
        self.parts.get(&side)
    }

    pub fn state(&self, side: Side) -> Option<&PartState> {
        self.parts.get(&side).map(|entry| &entry.state)
    }

    pub fn state_mut(&mut self, side: Side) -> Option<&mut PartState> {
        self.parts.get_mut(&side).map(|entry| &mut entry.state)
    }

    /// Store an entry, replacing whatever was on the side.
    pub fn insert(&mut self, side: Side, entry: PartEntry) {
        self.parts.insert(side, entry);
    }

    /// Detach the entry on `side`.
    pub fn remove(&mut self, side: Side) -> Option<PartEntry> {
        self.parts.remove(&side)
    }

    pub(crate) fn clear(&mut self) {
        self.parts.clear();
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Place a part on `side` of the container at `pos`.
///
/// Protocol: store the entry first, then attempt the network join. A join
/// refused because the durable id is already registered (an item was cloned)
/// gets exactly one retry with a freshly generated state; a second refusal
/// is an unrecoverable inconsistency.
pub fn place_part(
    network: Option<&mut Network>,
    world: &mut dyn WorldAccess,
    counters: &mut GlobalCounters,
    pos: DimPos,
    side: Side,
    definition: Arc<dyn PartDefinition>,
) -> Result<(), NetworkError> {
    let state = definition.create_state(counters);
    let container = world
        .container_mut(pos)
        .ok_or(NetworkError::ContainerMissing(pos))?;
    container.insert(
        side,
        PartEntry {
            definition: definition.clone(),
            state,
        },
    );

    if let Some(network) = network {
        let target = PartTarget::from_center(PartPos::new(pos, side));
        let element = PartNetworkElement::new(definition.clone(), target);
        if !network.add_element(Box::new(element.clone()), world)? {
            tracing::warn!(
                part = definition.name(),
                %pos,
                "part id already existed in the network, possibly an item duplication; regenerating"
            );
            let state = definition.create_state(counters);
            let container = world
                .container_mut(pos)
                .ok_or(NetworkError::ContainerMissing(pos))?;
            container.insert(
                side,
                PartEntry {
                    definition: definition.clone(),
                    state,
                },
            );
            if !network.add_element(Box::new(element), world)? {
                let id = world
                    .container(pos)
                    .and_then(|c| c.state(side))
                    .map(|s| s.id())
                    .ok_or(NetworkError::ContainerMissing(pos))?;
                return Err(NetworkError::IdCollision(id));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Remove the part on `side` of the container at `pos`.
///
/// Fires `on_pre_removed`, detaches the container entry, then fires the
/// post-removal hooks and drops the element from the network. Returns `true`
/// when the caller should also remove the container: it asked for
/// `destroy_if_empty`, the last part is gone, and the container is not a
/// real cable.
pub fn remove_part(
    network: Option<&mut Network>,
    world: &mut dyn WorldAccess,
    pos: DimPos,
    side: Side,
    destroy_if_empty: bool,
) -> Result<bool, NetworkError> {
    let mut network = network;

    let container = world
        .container(pos)
        .ok_or(NetworkError::ContainerMissing(pos))?;
    let entry = container
        .part(side)
        .ok_or(NetworkError::StateMissing { pos, side })?;
    let key = ElementKey {
        definition: entry.definition.stable_hash(),
        position: pos,
        side: Some(side),
    };

    if let Some(network) = network.as_deref_mut() {
        network.remove_element_pre(key, world)?;
    }

    world
        .container_mut(pos)
        .ok_or(NetworkError::ContainerMissing(pos))?
        .remove(side);

    if let Some(network) = network.as_deref_mut() {
        network.remove_element_post(key, world)?;
    }

    let container = world
        .container(pos)
        .ok_or(NetworkError::ContainerMissing(pos))?;
    Ok(destroy_if_empty && !container.is_real_cable() && !container.has_parts())
}
