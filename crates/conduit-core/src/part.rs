//! Part definitions, part state, and capabilities.
//!
//! A [`PartDefinition`] is the stateless, shared descriptor of a kind of
//! part; one instance serves every placed part of that kind. The mutable,
//! persisted data of a single instance lives in a [`PartState`] owned by the
//! container at the part's position.
//!
//! Never hold on to a `PartState` reference across calls: a resynchronized
//! container can replace the state instance at any time. Resolve it through
//! the container every time, the way
//! [`PartNetworkElement`](crate::part_element::PartNetworkElement) does.

use crate::counter::GlobalCounters;
use crate::element::NetworkError;
use crate::network::NetworkIndex;
use crate::persist::PersistError;
use crate::pos::{DimPos, PartPos};
use crate::Ticks;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counter key under which part ids are allocated.
pub const PART_COUNTER_KEY: &str = "part";

/// Update interval a fresh part state starts with.
pub const DEFAULT_UPDATE_INTERVAL: Ticks = 1;

/// A server-wide unique, persisted identifier for one part instance.
/// Stable across saves and container moves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartId(pub i32);

/// Stable hash for definition names, used as the element ordering key.
/// FNV-1a, so the value is identical across processes and runs.
pub fn name_hash(name: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A capability contributed to a part state at gather time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// An internal energy buffer (battery-backed parts).
    EnergyBuffer { capacity: i64, stored: i64 },
    /// Emits a signal level on the target side (panels, indicators).
    SignalEmitter { level: u8 },
    /// Counts scheduled updates (diagnostic meters).
    UpdateMeter { updates: u64 },
}

/// Discriminant tag for capabilities, used for lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    EnergyBuffer,
    SignalEmitter,
    UpdateMeter,
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::EnergyBuffer { .. } => CapabilityKind::EnergyBuffer,
            Capability::SignalEmitter { .. } => CapabilityKind::SignalEmitter,
            Capability::UpdateMeter { .. } => CapabilityKind::UpdateMeter,
        }
    }
}

/// Typed capability registry for one part state.
///
/// Persisted entries are contributed once, when the state is created
/// ([`PartDefinition::gather_capabilities`]). Volatile entries can come and
/// go at runtime and are never persisted. Lookup checks volatile entries
/// first so a runtime override shadows the persisted value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityStore {
    entries: Vec<Capability>,
    #[serde(skip)]
    volatile: Vec<Capability>,
}

impl CapabilityStore {
    pub fn add(&mut self, capability: Capability) {
        self.entries.push(capability);
    }

    pub fn add_volatile(&mut self, capability: Capability) {
        self.volatile.push(capability);
    }

    pub fn remove_volatile(&mut self, kind: CapabilityKind) {
        self.volatile.retain(|c| c.kind() != kind);
    }

    pub fn has(&self, kind: CapabilityKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.volatile
            .iter()
            .chain(self.entries.iter())
            .find(|c| c.kind() == kind)
    }

    pub fn get_mut(&mut self, kind: CapabilityKind) -> Option<&mut Capability> {
        self.volatile
            .iter_mut()
            .chain(self.entries.iter_mut())
            .find(|c| c.kind() == kind)
    }
}

// ---------------------------------------------------------------------------
// PartState
// ---------------------------------------------------------------------------

/// The mutable, persisted data for one part instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartState {
    id: PartId,
    update_interval: Ticks,
    enabled: bool,
    capabilities: CapabilityStore,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    update: bool,
}

impl PartState {
    /// Create a fresh state with a newly allocated durable id. The id is
    /// assigned here, exactly once per logical part instance.
    pub fn new(counters: &mut GlobalCounters) -> Self {
        Self {
            id: PartId(counters.next(PART_COUNTER_KEY)),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            enabled: true,
            capabilities: CapabilityStore::default(),
            dirty: false,
            update: false,
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    pub fn update_interval(&self) -> Ticks {
        self.update_interval
    }

    /// Takes effect on the element's next counter cycle.
    pub fn set_update_interval(&mut self, interval: Ticks) {
        self.update_interval = interval;
        self.mark_dirty();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.mark_dirty();
    }

    pub fn capabilities(&self) -> &CapabilityStore {
        &self.capabilities
    }

    pub fn capabilities_mut(&mut self) -> &mut CapabilityStore {
        &mut self.capabilities
    }

    /// Flag this state as needing persistence.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check the dirty flag and reset it.
    pub fn is_dirty_and_reset(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Flag this state as needing a sync to observers.
    pub fn send_update(&mut self) {
        self.update = true;
    }

    /// Check the sync flag and reset it.
    pub fn is_update_and_reset(&mut self) -> bool {
        std::mem::take(&mut self.update)
    }
}

// ---------------------------------------------------------------------------
// PartTarget
// ---------------------------------------------------------------------------

/// Where a part is mounted and which neighbor it interacts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartTarget {
    /// The position+side the part is mounted on.
    pub center: PartPos,
    /// The faced neighbor, seen from its side towards the center.
    pub target: PartPos,
}

impl PartTarget {
    /// Derive the target from the mount point: the neighbor position on the
    /// mounted side, approached from the opposite side.
    pub fn from_center(center: PartPos) -> Self {
        Self {
            center,
            target: PartPos::new(center.pos.offset(center.side), center.side.opposite()),
        }
    }
}

// ---------------------------------------------------------------------------
// PartDefinition
// ---------------------------------------------------------------------------

/// The stateless, shared descriptor of a kind of part.
///
/// Lifecycle hooks receive the addressing index, the part's target, and its
/// current state; the defaults are no-ops so a definition only overrides
/// what it cares about.
pub trait PartDefinition: fmt::Debug {
    /// Registry name, also the persisted type tag.
    fn name(&self) -> &str;

    /// Stable identity hash used for element ordering.
    fn stable_hash(&self) -> u64 {
        name_hash(self.name())
    }

    /// Construct the default state for a new instance: allocate the durable
    /// id, then let the definition contribute its capabilities.
    fn create_state(&self, counters: &mut GlobalCounters) -> PartState {
        let mut state = PartState::new(counters);
        self.gather_capabilities(&mut state);
        state
    }

    /// Contribute capability entries to a freshly created state.
    fn gather_capabilities(&self, state: &mut PartState) {
        let _ = state;
    }

    /// Tick interval between updates for this state.
    fn update_interval(&self, state: &PartState) -> Ticks {
        state.update_interval()
    }

    /// Whether parts of this kind take scheduled updates.
    fn wants_update(&self, state: &PartState) -> bool {
        let _ = state;
        false
    }

    /// Energy drawn per scheduled update, derived from current state.
    fn consumption_rate(&self, state: &PartState) -> i64 {
        let _ = state;
        0
    }

    /// Scheduled update with the current state.
    fn update(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn on_network_addition(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn on_network_removal(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn before_network_kill(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn after_network_alive(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn after_network_re_alive(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    fn on_pre_removed(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state);
        Ok(())
    }

    /// Fires after the container entry was detached, so no state remains to
    /// resolve.
    fn on_post_removed(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
    ) -> Result<(), NetworkError> {
        let _ = (index, target);
        Ok(())
    }

    fn on_neighbor_change(
        &self,
        index: &mut NetworkIndex,
        target: &PartTarget,
        state: &mut PartState,
        neighbor: DimPos,
    ) -> Result<(), NetworkError> {
        let _ = (index, target, state, neighbor);
        Ok(())
    }

    /// Encode a state to its persisted blob.
    fn write_state(&self, state: &PartState) -> Result<Vec<u8>, PersistError> {
        bitcode::serialize(state).map_err(|e| PersistError::Encode {
            part_type: self.name().to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a state from its persisted blob.
    fn read_state(&self, blob: &[u8]) -> Result<PartState, PersistError> {
        bitcode::deserialize(blob).map_err(|e| PersistError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::{BlockPos, DimPos, Side, WorldId};

    #[test]
    fn name_hash_is_stable_and_distinct() {
        assert_eq!(name_hash("probe"), name_hash("probe"));
        assert_ne!(name_hash("probe"), name_hash("emitter"));
        // FNV-1a of the empty string is the offset basis.
        assert_eq!(name_hash(""), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn state_ids_are_allocated_once_and_distinct() {
        let mut counters = GlobalCounters::new();
        let a = PartState::new(&mut counters);
        let b = PartState::new(&mut counters);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), PartId(0));
        assert_eq!(b.id(), PartId(1));
    }

    #[test]
    fn dirty_flag_is_take_and_reset() {
        let mut counters = GlobalCounters::new();
        let mut state = PartState::new(&mut counters);
        assert!(!state.is_dirty_and_reset());
        state.set_enabled(false);
        assert!(state.is_dirty_and_reset());
        assert!(!state.is_dirty_and_reset());
    }

    #[test]
    fn update_flag_is_take_and_reset() {
        let mut counters = GlobalCounters::new();
        let mut state = PartState::new(&mut counters);
        state.send_update();
        assert!(state.is_update_and_reset());
        assert!(!state.is_update_and_reset());
    }

    #[test]
    fn capability_lookup_by_kind() {
        let mut store = CapabilityStore::default();
        store.add(Capability::EnergyBuffer {
            capacity: 1000,
            stored: 0,
        });
        assert!(store.has(CapabilityKind::EnergyBuffer));
        assert!(!store.has(CapabilityKind::SignalEmitter));
        match store.get_mut(CapabilityKind::EnergyBuffer) {
            Some(Capability::EnergyBuffer { stored, .. }) => *stored = 500,
            other => panic!("expected energy buffer, got {other:?}"),
        }
        assert_eq!(
            store.get(CapabilityKind::EnergyBuffer),
            Some(&Capability::EnergyBuffer {
                capacity: 1000,
                stored: 500
            })
        );
    }

    #[test]
    fn volatile_capability_shadows_persisted_and_is_removable() {
        let mut store = CapabilityStore::default();
        store.add(Capability::SignalEmitter { level: 1 });
        store.add_volatile(Capability::SignalEmitter { level: 15 });
        assert_eq!(
            store.get(CapabilityKind::SignalEmitter),
            Some(&Capability::SignalEmitter { level: 15 })
        );
        store.remove_volatile(CapabilityKind::SignalEmitter);
        assert_eq!(
            store.get(CapabilityKind::SignalEmitter),
            Some(&Capability::SignalEmitter { level: 1 })
        );
    }

    #[test]
    fn volatile_capabilities_are_not_persisted() {
        let mut counters = GlobalCounters::new();
        let mut state = PartState::new(&mut counters);
        state
            .capabilities_mut()
            .add(Capability::UpdateMeter { updates: 3 });
        state
            .capabilities_mut()
            .add_volatile(Capability::SignalEmitter { level: 7 });

        let blob = bitcode::serialize(&state).unwrap();
        let restored: PartState = bitcode::deserialize(&blob).unwrap();
        assert!(restored.capabilities().has(CapabilityKind::UpdateMeter));
        assert!(!restored.capabilities().has(CapabilityKind::SignalEmitter));
        assert_eq!(restored.id(), state.id());
    }

    #[test]
    fn target_from_center_faces_the_neighbor() {
        let center = PartPos::new(
            DimPos::new(WorldId(0), BlockPos::new(0, 0, 0)),
            Side::East,
        );
        let target = PartTarget::from_center(center);
        assert_eq!(target.center, center);
        assert_eq!(target.target.pos.pos, BlockPos::new(1, 0, 0));
        assert_eq!(target.target.side, Side::West);
    }
}
