//! The network: element membership, addressing, scheduling, lifecycle.
//!
//! A network owns the elements of one connected cluster plus the index that
//! addresses parts by durable id. It is created when a topology is first
//! discovered, killed when the topology is invalidated, and a *new* network
//! is built on the next discovery; elements observe the difference through
//! `after_network_alive` versus `after_network_re_alive`.
//!
//! # Scheduling
//!
//! Each element declares `wants_update` and an interval when the network
//! initializes. Every tick advances a per-element counter; when the counter
//! reaches the interval the element updates and the counter resets. The
//! interval is re-sampled at each reset, so a changed interval takes effect
//! on the next cycle, never retroactively. An element registered at tick `T`
//! with interval `n` sees its first update at `T+n`.
//!
//! # Ownership
//!
//! The element set and the id index belong to the network alone. Collaborators
//! read them through accessors; all mutation goes through
//! [`add_element`](Network::add_element) and the removal protocol.

use crate::element::{ElementKey, NetworkElement, NetworkError};
use crate::part::{PartDefinition, PartId, PartTarget};
use crate::part_element::PartNetworkElement;
use crate::path::Cluster;
use crate::pos::{DimPos, PartPos};
use crate::registry::UnknownPartResolver;
use crate::world::WorldAccess;
use crate::Ticks;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::collections::BTreeMap;
use std::sync::Arc;

new_key_type! {
    /// Storage slot of an element within one network instance. Never
    /// persisted; durable identity is [`ElementKey`].
    pub struct ElementSlot;
}

/// Network lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Alive,
    Dead,
}

/// Events recorded by the network, drained by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    ElementAdded { key: ElementKey, tick: Ticks },
    ElementRemoved { key: ElementKey, tick: Ticks },
    NetworkAlive { revived: bool, tick: Ticks },
    NetworkKilled { tick: Ticks },
}

// ---------------------------------------------------------------------------
// NetworkIndex
// ---------------------------------------------------------------------------

/// Addressing state shared with element hooks: the durable part id to
/// position map. Exclusively owned by the network; elements mutate it only
/// from within their join/removal hooks.
#[derive(Debug, Default)]
pub struct NetworkIndex {
    parts: BTreeMap<PartId, PartPos>,
}

impl NetworkIndex {
    /// Claim an id for a position. Returns `false` when the id is already
    /// addressed, which refuses the join (the duplication scenario).
    pub fn register_part(&mut self, id: PartId, pos: PartPos) -> bool {
        if self.parts.contains_key(&id) {
            return false;
        }
        self.parts.insert(id, pos);
        true
    }

    pub fn unregister_part(&mut self, id: PartId) -> Option<PartPos> {
        self.parts.remove(&id)
    }

    pub fn part_position(&self, id: PartId) -> Option<PartPos> {
        self.parts.get(&id).copied()
    }

    pub fn contains_part(&self, id: PartId) -> bool {
        self.parts.contains_key(&id)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Registered ids with their positions, in id order.
    pub fn parts(&self) -> impl Iterator<Item = (PartId, PartPos)> + '_ {
        self.parts.iter().map(|(id, pos)| (*id, *pos))
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Per-element scheduling data, sampled at initialization.
#[derive(Debug, Clone, Copy, Default)]
struct Schedule {
    wants_update: bool,
    interval: Ticks,
    counter: Ticks,
}

/// One logical network: the members of a connected cluster plus scheduling
/// and addressing state.
#[derive(Debug)]
pub struct Network {
    elements: SlotMap<ElementSlot, Box<dyn NetworkElement>>,
    by_key: BTreeMap<ElementKey, ElementSlot>,
    schedules: SecondaryMap<ElementSlot, Schedule>,
    index: NetworkIndex,
    lifecycle: Lifecycle,
    resolvers: Vec<Box<dyn UnknownPartResolver>>,
    events: Vec<NetworkEvent>,
    tick: Ticks,
    last_consumption: i64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create an empty, uninitialized network.
    pub fn new() -> Self {
        Self {
            elements: SlotMap::with_key(),
            by_key: BTreeMap::new(),
            schedules: SecondaryMap::new(),
            index: NetworkIndex::default(),
            lifecycle: Lifecycle::Uninitialized,
            resolvers: Vec::new(),
            events: Vec::new(),
            tick: 0,
            last_consumption: 0,
        }
    }

    /// Build a network from a discovered cluster: every cluster position
    /// contributes one element per part mounted on its container.
    ///
    /// A cluster position without a container means the topology no longer
    /// matches the world and is fatal. An element refused because its
    /// durable id is already taken is skipped with a warning; loading stays
    /// best-effort.
    pub fn from_cluster(
        cluster: &Cluster,
        world: &mut dyn WorldAccess,
    ) -> Result<Network, NetworkError> {
        let mut network = Network::new();
        for position in cluster.positions() {
            let container = world
                .container(position)
                .ok_or(NetworkError::ContainerMissing(position))?;
            let mounted: Vec<(crate::pos::Side, Arc<dyn PartDefinition>)> = container
                .parts()
                .map(|(side, entry)| (side, entry.definition.clone()))
                .collect();
            for (side, definition) in mounted {
                let target = PartTarget::from_center(PartPos::new(position, side));
                let element = PartNetworkElement::new(definition, target);
                if !network.add_element(Box::new(element), world)? {
                    tracing::warn!(%position, %side, "skipped network element with a duplicate part id");
                }
            }
        }
        Ok(network)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Attempt to add an element. Returns `Ok(false)` when the element is
    /// already present or its join hook refused the addition; in both cases
    /// the element stays unregistered.
    pub fn add_element(
        &mut self,
        element: Box<dyn NetworkElement>,
        world: &mut dyn WorldAccess,
    ) -> Result<bool, NetworkError> {
        let key = element.key();
        if self.by_key.contains_key(&key) {
            return Ok(false);
        }
        if !element.on_network_addition(&mut self.index, world)? {
            return Ok(false);
        }
        // A member joining a live network is scheduled immediately; its
        // first update comes one full interval later.
        let schedule = if self.lifecycle == Lifecycle::Alive {
            Some(Schedule {
                wants_update: element.wants_update(world)?,
                interval: element.update_interval(world)?,
                counter: 0,
            })
        } else {
            None
        };
        let slot = self.elements.insert(element);
        self.by_key.insert(key, slot);
        if let Some(schedule) = schedule {
            self.schedules.insert(slot, schedule);
        }
        self.events.push(NetworkEvent::ElementAdded {
            key,
            tick: self.tick,
        });
        Ok(true)
    }

    /// Begin removal of an element whose container entry is about to be
    /// detached: fire `on_pre_removed`, then the unconditional
    /// `on_network_removal` cleanup, which drops the id index entry while
    /// the state is still resolvable.
    pub fn remove_element_pre(
        &mut self,
        key: ElementKey,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let slot = self.slot_of(key)?;
        let element = &self.elements[slot];
        element.on_pre_removed(&mut self.index, world)?;
        element.on_network_removal(&mut self.index, world)
    }

    /// Complete removal after the container entry was detached: fire
    /// `on_post_removed` and drop the element from membership and
    /// scheduling.
    pub fn remove_element_post(
        &mut self,
        key: ElementKey,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let slot = self.slot_of(key)?;
        self.elements[slot].on_post_removed(&mut self.index, world)?;
        self.schedules.remove(slot);
        self.by_key.remove(&key);
        self.elements.remove(slot);
        self.events.push(NetworkEvent::ElementRemoved {
            key,
            tick: self.tick,
        });
        Ok(())
    }

    fn slot_of(&self, key: ElementKey) -> Result<ElementSlot, NetworkError> {
        self.by_key
            .get(&key)
            .copied()
            .ok_or(NetworkError::UnknownElement(key))
    }

    pub fn contains(&self, key: ElementKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn element_count(&self) -> usize {
        self.by_key.len()
    }

    /// Member keys, in element order.
    pub fn element_keys(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.by_key.keys().copied()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Bring the network alive: sample every member's scheduling contract,
    /// then fire the alive hook on each once initialization completed for
    /// all of them. `revived` distinguishes a rebuild with the same logical
    /// members from a first initialization.
    pub fn initialize(
        &mut self,
        world: &mut dyn WorldAccess,
        revived: bool,
    ) -> Result<(), NetworkError> {
        self.schedules.clear();
        let slots: Vec<ElementSlot> = self.by_key.values().copied().collect();
        for &slot in &slots {
            let element = &self.elements[slot];
            let schedule = Schedule {
                wants_update: element.wants_update(world)?,
                interval: element.update_interval(world)?,
                counter: 0,
            };
            self.schedules.insert(slot, schedule);
        }
        self.lifecycle = Lifecycle::Alive;
        for &slot in &slots {
            let element = &self.elements[slot];
            if revived {
                element.after_network_re_alive(&mut self.index, world)?;
            } else {
                element.after_network_alive(&mut self.index, world)?;
            }
        }
        self.events.push(NetworkEvent::NetworkAlive {
            revived,
            tick: self.tick,
        });
        Ok(())
    }

    /// Tear the network down. Every member sees `before_network_kill` before
    /// any detachment; all further scheduling stops immediately.
    pub fn kill(&mut self, world: &mut dyn WorldAccess) -> Result<(), NetworkError> {
        let slots: Vec<ElementSlot> = self.by_key.values().copied().collect();
        for slot in slots {
            let element = &self.elements[slot];
            element.before_network_kill(&mut self.index, world)?;
        }
        self.schedules.clear();
        self.lifecycle = Lifecycle::Dead;
        self.events.push(NetworkEvent::NetworkKilled { tick: self.tick });
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle == Lifecycle::Alive
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one scheduler tick.
    ///
    /// Advances per-element counters, updates the elements whose interval
    /// elapsed, and aggregates the energy drawn by the elements updated this
    /// tick into [`last_consumption`](Network::last_consumption). A no-op
    /// unless the network is alive.
    pub fn tick(&mut self, world: &mut dyn WorldAccess) -> Result<(), NetworkError> {
        if self.lifecycle != Lifecycle::Alive {
            return Ok(());
        }
        self.tick += 1;
        let mut consumption = 0i64;
        let slots: Vec<ElementSlot> = self.by_key.values().copied().collect();
        for slot in slots {
            let Some(schedule) = self.schedules.get(slot) else {
                continue;
            };
            if !schedule.wants_update {
                continue;
            }
            let counter = schedule.counter + 1;
            if counter >= schedule.interval {
                {
                    let element = &self.elements[slot];
                    element.update(&mut self.index, world)?;
                    consumption += element.consumption_rate(world)?;
                }
                // Cycle complete: reset and pick up an interval change.
                let interval = self.elements[slot].update_interval(world)?;
                if let Some(schedule) = self.schedules.get_mut(slot) {
                    schedule.counter = 0;
                    schedule.interval = interval;
                }
            } else if let Some(schedule) = self.schedules.get_mut(slot) {
                schedule.counter = counter;
            }
        }
        self.last_consumption = consumption;
        Ok(())
    }

    /// The current tick count of this network instance.
    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    /// Energy drawn by the elements updated during the most recent tick.
    /// Supply enforcement against this aggregate is a collaborator's
    /// concern.
    pub fn last_consumption(&self) -> i64 {
        self.last_consumption
    }

    // -----------------------------------------------------------------------
    // Notifications, addressing, resolvers, events
    // -----------------------------------------------------------------------

    /// Deliver a neighbor-change notification to every element mounted at
    /// `center`. Safe to call from within an update of another element.
    pub fn notify_neighbor_change(
        &mut self,
        world: &mut dyn WorldAccess,
        center: DimPos,
        neighbor: DimPos,
    ) -> Result<(), NetworkError> {
        let slots: Vec<ElementSlot> = self
            .by_key
            .iter()
            .filter(|(key, _)| key.position == center)
            .map(|(_, slot)| *slot)
            .collect();
        for slot in slots {
            let element = &self.elements[slot];
            element.on_neighbor_block_change(&mut self.index, world, neighbor)?;
        }
        Ok(())
    }

    /// Read access to the addressing index.
    pub fn index(&self) -> &NetworkIndex {
        &self.index
    }

    pub fn add_unknown_part_resolver(&mut self, resolver: Box<dyn UnknownPartResolver>) {
        self.resolvers.push(resolver);
    }

    /// Consult the resolver list, in registration order, for a stored part
    /// type name the registry does not know.
    pub fn resolve_unknown_part(&self, name: &str) -> Option<Arc<dyn PartDefinition>> {
        self.resolvers.iter().find_map(|r| r.resolve(name))
    }

    /// Drain the recorded events, oldest first.
    pub fn drain_events(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.events)
    }
}
