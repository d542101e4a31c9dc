//! The network element contract.
//!
//! A network element is one member of a [`Network`](crate::network::Network):
//! a part mounted on a cable, or any other infrastructure node. Multiple
//! instances can exist for the same logical element (the container holding
//! its state may be replaced wholesale, e.g. on a state resync), so identity
//! is carried by [`ElementKey`], a pure value, and never by instance address.
//!
//! Every hook receives the network's addressing index and the world facade;
//! state is re-resolved through the facade on each call rather than cached,
//! which is what makes nested hook invocation within a tick safe.

use crate::network::NetworkIndex;
use crate::part::PartId;
use crate::pos::{DimPos, Side};
use crate::world::WorldAccess;
use crate::Ticks;
use std::fmt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by network elements and the network engine.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The topology claims a container at this position, but the world has
    /// none. The graph and world state have diverged.
    #[error("the part container at {0} could not be found")]
    ContainerMissing(DimPos),
    /// The container exists but holds no part on the expected side.
    #[error("no part state on side {side} of the container at {pos}")]
    StateMissing { pos: DimPos, side: Side },
    /// A freshly regenerated durable id collided again.
    #[error("part id {0:?} already registered after regenerating; unrecoverable inconsistency")]
    IdCollision(PartId),
    /// The element is not registered in this network.
    #[error("element {0:?} is not registered in this network")]
    UnknownElement(ElementKey),
}

// ---------------------------------------------------------------------------
// ElementKey
// ---------------------------------------------------------------------------

/// Durable identity of a network element.
///
/// Ordering compares the definition hash first, then the center position,
/// then the center side. Two element instances representing the same logical
/// part compare equal and collide in any keyed structure, which is exactly
/// what lets a rebuilt instance stand in for the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementKey {
    /// Stable hash of the element's definition (part type).
    pub definition: u64,
    /// Center position the element is mounted at.
    pub position: DimPos,
    /// Mounted side, for elements that occupy one.
    pub side: Option<Side>,
}

// ---------------------------------------------------------------------------
// NetworkElement
// ---------------------------------------------------------------------------

/// The contract every network member implements.
///
/// `wants_update` is sampled once when the network initializes;
/// `update_interval` is sampled at initialization and again each time the
/// element's counter cycle completes. Hooks are listed in lifecycle order.
pub trait NetworkElement: fmt::Debug {
    /// Durable identity key. Instances representing the same logical element
    /// must return equal keys.
    fn key(&self) -> ElementKey;

    /// Tick interval between updates. Zero means every tick.
    fn update_interval(&self, world: &dyn WorldAccess) -> Result<Ticks, NetworkError>;

    /// Whether this element takes scheduled updates at all.
    fn wants_update(&self, world: &dyn WorldAccess) -> Result<bool, NetworkError>;

    /// Scheduled update.
    fn update(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError>;

    /// Energy drawn per scheduled update, derived from current state.
    /// The network sums this over the elements updated in a tick.
    fn consumption_rate(&self, world: &dyn WorldAccess) -> Result<i64, NetworkError> {
        let _ = world;
        Ok(0)
    }

    /// Join attempt. Returning `Ok(false)` refuses the join and leaves the
    /// element unregistered (e.g. its durable id is already taken).
    fn on_network_addition(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<bool, NetworkError> {
        let _ = (index, world);
        Ok(true)
    }

    /// Called once after initialization completed for all members.
    fn after_network_alive(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Called instead of [`after_network_alive`](Self::after_network_alive)
    /// when a network is rebuilt with the same logical members.
    fn after_network_re_alive(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Called right before the network is torn down, before any member is
    /// detached. No further updates happen on this network instance.
    fn before_network_kill(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Called before this element's container entry is detached.
    fn on_pre_removed(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Called after this element's container entry was detached.
    fn on_post_removed(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Unconditional cleanup when the element leaves the network.
    fn on_network_removal(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
    ) -> Result<(), NetworkError> {
        let _ = (index, world);
        Ok(())
    }

    /// Passthrough notification that a neighboring position changed.
    /// Carries no scheduling implication.
    fn on_neighbor_block_change(
        &self,
        index: &mut NetworkIndex,
        world: &mut dyn WorldAccess,
        neighbor: DimPos,
    ) -> Result<(), NetworkError> {
        let _ = (index, world, neighbor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::{BlockPos, WorldId};

    fn key(definition: u64, x: i32, side: Option<Side>) -> ElementKey {
        ElementKey {
            definition,
            position: DimPos::new(WorldId(0), BlockPos::new(x, 0, 0)),
            side,
        }
    }

    #[test]
    fn ordering_compares_definition_first() {
        assert!(key(1, 9, Some(Side::Up)) < key(2, 0, Some(Side::Down)));
    }

    #[test]
    fn ordering_falls_back_to_position_then_side() {
        assert!(key(1, 0, Some(Side::Down)) < key(1, 1, Some(Side::Down)));
        assert!(key(1, 0, Some(Side::Down)) < key(1, 0, Some(Side::Up)));
    }

    #[test]
    fn equal_keys_collide_in_sets() {
        let mut set = std::collections::BTreeSet::new();
        assert!(set.insert(key(1, 0, Some(Side::Down))));
        assert!(!set.insert(key(1, 0, Some(Side::Down))));
        assert_eq!(set.len(), 1);
    }
}
