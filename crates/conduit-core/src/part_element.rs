//! The network element backing a mounted part.
//!
//! Holds nothing but the shared definition and the mount target. The part
//! state is looked up through the container facade on every access; caching
//! the state here would silently operate on a stale copy whenever the
//! container is swapped out underneath us.

use crate::element::{ElementKey, NetworkElement, NetworkError};
use crate::network::NetworkIndex;
use crate::part::{PartDefinition, PartState, PartTarget};
use crate::pos::DimPos;
use crate::world::WorldAccess;
use crate::Ticks;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A network element for a part mounted at a target.
#[derive(Debug, Clone)]
pub struct PartNetworkElement {
    definition: Arc<dyn PartDefinition>,
    target: PartTarget,
}

impl PartNetworkElement {
    pub fn new(definition: Arc<dyn PartDefinition>, target: PartTarget) -> Self {
        Self { definition, target }
    }

    pub fn definition(&self) -> &Arc<dyn PartDefinition> {
        &self.definition
    }

    pub fn target(&self) -> &PartTarget {
        &self.target
    }

    /// Resolve the current state through the container at the center
    /// position. Failing to find the container or the state means the
    /// topology and world state have diverged, which must surface loudly.
    fn state<'w>(&self, world: &'w dyn WorldAccess) -> Result<&'w PartState, NetworkError> {
        let center = self.target.center;
        let container = world
            .container(center.pos)
            .ok_or(NetworkError::ContainerMissing(center.pos))?;
        container.state(center.side).ok_or(NetworkError::StateMissing {
            pos: center.pos,
            side: center.side,
        })
    }

    fn state_mut<'w>(
        &self,
        world: &'w mut dyn WorldAccess,
    ) -> Result<&'w mut PartState, NetworkError> {
        let center = self.target.center;
        let container = world
            .container_mut(center.pos)
            .ok_or(NetworkError::ContainerMissing(center.pos))?;
        container
            .state_mut(center.side)
            .ok_or(NetworkError::StateMissing {
                pos: center.pos,
                side: center.side,
            })
    }
}

impl NetworkElement for PartNetworkElement {
    fn key(&self) -> ElementKey {
        ElementKey {
            definition: self.definition.stable_hash(),
            position: self.target.center.pos,
            side: Some(self.target.center.side),
        }
    }

    fn update_interval(&self, world: &dyn WorldAccess) -> Result<Ticks, NetworkError> {
        Ok(self.definition.update_interval(self.state(world)?))
    }

    fn wants_update(&self, world: &dyn WorldAccess) -> Result<bool, NetworkError> {
        Ok(self.definition.wants_update(self.state(world)?))
    }

    fn update(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let state = self.state_mut(world)?;
        if state.is_enabled() {
            self.definition.update(index, &self.target, state)?;
        }
        Ok(())
    }

    fn consumption_rate(&self, world: &dyn WorldAccess) -> Result<i64, NetworkError> {
        Ok(self.definition.consumption_rate(self.state(world)?))
    }

    fn on_network_addition(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<bool, NetworkError> {
        let id = self.state(world)?.id();
        if !index.register_part(id, self.target.center) {
            // The durable id is already addressed somewhere in this network.
            return Ok(false);
        }
        self.definition
            .on_network_addition(index, &self.target, self.state_mut(world)?)?;
        Ok(true)
    }

    fn on_network_removal(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let id = self.state(world)?.id();
        index.unregister_part(id);
        self.definition
            .on_network_removal(index, &self.target, self.state_mut(world)?)
    }

    fn after_network_alive(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        self.definition
            .after_network_alive(index, &self.target, self.state_mut(world)?)
    }

    fn after_network_re_alive(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        self.definition
            .after_network_re_alive(index, &self.target, self.state_mut(world)?)
    }

    fn before_network_kill(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        self.definition
            .before_network_kill(index, &self.target, self.state_mut(world)?)
    }

    fn on_pre_removed(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        self.definition
            .on_pre_removed(index, &self.target, self.state_mut(world)?)
    }

    fn on_post_removed(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        // The container entry is already detached; the state must not be
        // resolved here.
        let _ = world;
        self.definition.on_post_removed(index, &self.target)
    }

    fn on_neighbor_block_change(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
        neighbor: DimPos,
    ) -> Result<(), NetworkError> {
        self.definition
            .on_neighbor_change(index, &self.target, self.state_mut(world)?, neighbor)
    }
}

// Value identity: distinct instances for the same logical part compare
// equal and hash together.

impl PartialEq for PartNetworkElement {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PartNetworkElement {}

impl PartialOrd for PartNetworkElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartNetworkElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for PartNetworkElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PartEntry;
    use crate::pos::{BlockPos, DimPos, PartPos, Side, WorldId};
    use crate::test_utils::{probe, MapWorld};
    use crate::world::WorldAccess;
    use std::collections::BTreeSet;

    fn at(x: i32) -> DimPos {
        DimPos::new(WorldId(0), BlockPos::new(x, 0, 0))
    }

    fn element_at(x: i32, side: Side) -> PartNetworkElement {
        PartNetworkElement::new(probe(), PartTarget::from_center(PartPos::new(at(x), side)))
    }

    #[test]
    fn distinct_instances_for_same_part_compare_equal() {
        let a = element_at(0, Side::North);
        let b = element_at(0, Side::North);
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn equal_elements_collide_in_sorted_sets() {
        let mut set = BTreeSet::new();
        assert!(set.insert(element_at(0, Side::North)));
        assert!(!set.insert(element_at(0, Side::North)));
        assert!(set.insert(element_at(0, Side::South)));
        assert!(set.insert(element_at(1, Side::North)));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn state_resolution_fails_loudly_without_container() {
        let world = MapWorld::new(1);
        let element = element_at(0, Side::North);
        let err = element.wants_update(&world).unwrap_err();
        assert!(matches!(err, NetworkError::ContainerMissing(_)));
    }

    #[test]
    fn state_resolution_fails_loudly_without_part() {
        let mut world = MapWorld::new(1);
        world.add_cable(at(0));
        let element = element_at(0, Side::North);
        let err = element.update_interval(&world).unwrap_err();
        assert!(matches!(err, NetworkError::StateMissing { .. }));
    }

    #[test]
    fn state_is_resolved_through_the_current_container() {
        let mut world = MapWorld::new(1);
        world.add_cable(at(0));
        let mut counters = crate::counter::GlobalCounters::new();
        let definition = probe();
        let state = definition.create_state(&mut counters);
        world
            .container_mut(at(0))
            .unwrap()
            .insert(Side::North, PartEntry { definition: definition.clone(), state });

        let element = element_at(0, Side::North);
        let first = element.update_interval(&world).unwrap();

        // Replace the container wholesale, as a resync would; the element
        // must see the new state on the next access.
        let mut replacement = definition.create_state(&mut counters);
        replacement.set_update_interval(first + 5);
        world
            .container_mut(at(0))
            .unwrap()
            .insert(Side::North, PartEntry { definition, state: replacement });
        assert_eq!(element.update_interval(&world).unwrap(), first + 5);
    }
}
