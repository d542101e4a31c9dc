//! Energy grids for Conduit part networks.
//!
//! The core network aggregates the consumption of the elements it updated
//! each tick ([`Network::last_consumption`]); this crate balances that
//! demand against generation and storage. Per-grid satisfaction is a Q32.32
//! ratio in `0..=1`, and brownout/restored events fire only on transitions,
//! not every tick.
//!
//! # Design
//!
//! - Sources and storage are keyed by the part's durable id, so they survive
//!   network rebuilds the same way the parts themselves do.
//! - Each grid tracks its own member ids; per-part specs live in the module.
//! - The core guarantees nothing about supply; "sum of active consumers <=
//!   supply" enforcement happens here, by scaling satisfaction.

use std::collections::HashMap;

use conduit_core::network::Network;
use conduit_core::part::PartId;
use conduit_core::Ticks;
use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Q32.32 fixed-point ratio type.
pub type Fixed64 = I32F32;

// ---------------------------------------------------------------------------
// Grid identifier
// ---------------------------------------------------------------------------

/// Identifies an energy grid. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnergyGridId(pub u32);

// ---------------------------------------------------------------------------
// Per-part energy specs
// ---------------------------------------------------------------------------

/// A part that generates energy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergySource {
    /// Generation per tick.
    pub output: Fixed64,
}

/// A part that stores energy (battery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyStorage {
    /// Maximum charge. Ignored for creative storage.
    pub capacity: Fixed64,
    /// Current charge. Clamped to [0, capacity].
    pub charge: Fixed64,
    /// Maximum charge/discharge per tick.
    pub charge_rate: Fixed64,
    /// A creative battery covers any deficit without draining and absorbs
    /// any excess without filling.
    pub creative: bool,
}

impl EnergyStorage {
    pub fn new(capacity: Fixed64, charge_rate: Fixed64) -> Self {
        Self {
            capacity,
            charge: Fixed64::from_num(0),
            charge_rate,
            creative: false,
        }
    }

    /// An always-full battery with unbounded throughput.
    pub fn creative() -> Self {
        Self {
            capacity: Fixed64::MAX,
            charge: Fixed64::MAX,
            charge_rate: Fixed64::MAX,
            creative: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Energy grid
// ---------------------------------------------------------------------------

/// One energy grid: the sources and storage backing one part network.
///
/// The satisfaction ratio indicates how well demand was met on the last
/// balanced tick: 1.0 means fully powered, 0.0 means no energy at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyGrid {
    pub id: EnergyGridId,
    /// Source part ids (contiguous for cache-friendly iteration).
    pub sources: Vec<PartId>,
    /// Storage part ids (contiguous for cache-friendly iteration).
    pub storage: Vec<PartId>,
    /// Satisfaction of the last balanced tick: 0.0 to 1.0.
    pub satisfaction: Fixed64,
    /// Whether this grid was in brownout state last tick. Used to detect
    /// transitions for event emission.
    pub was_brownout: bool,
}

impl EnergyGrid {
    pub fn new(id: EnergyGridId) -> Self {
        Self {
            id,
            sources: Vec::new(),
            storage: Vec::new(),
            satisfaction: Fixed64::from_num(1),
            was_brownout: false,
        }
    }

    pub fn add_source(&mut self, part: PartId) {
        if !self.sources.contains(&part) {
            self.sources.push(part);
        }
    }

    pub fn add_storage(&mut self, part: PartId) {
        if !self.storage.contains(&part) {
            self.storage.push(part);
        }
    }

    pub fn remove_part(&mut self, part: PartId) {
        self.sources.retain(|p| *p != part);
        self.storage.retain(|p| *p != part);
    }
}

// ---------------------------------------------------------------------------
// Energy events
// ---------------------------------------------------------------------------

/// Events emitted on grid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnergyEvent {
    /// Emitted when a grid transitions from satisfied to brownout.
    GridBrownout {
        grid_id: EnergyGridId,
        /// The deficit: demand - (generation + storage discharge).
        deficit: Fixed64,
        tick: Ticks,
    },
    /// Emitted when a grid transitions from brownout back to satisfied.
    GridRestored { grid_id: EnergyGridId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// Energy module
// ---------------------------------------------------------------------------

/// Manages all energy grids and per-part energy specifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnergyModule {
    /// All grids, keyed by grid ID.
    pub grids: HashMap<EnergyGridId, EnergyGrid>,
    /// Per-part source specs.
    pub sources: HashMap<PartId, EnergySource>,
    /// Per-part storage specs (mutable charge state).
    pub storage: HashMap<PartId, EnergyStorage>,
    /// Next grid ID to assign.
    next_grid_id: u32,
}

impl EnergyModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty grid and return its ID.
    pub fn create_grid(&mut self) -> EnergyGridId {
        let id = EnergyGridId(self.next_grid_id);
        self.next_grid_id += 1;
        self.grids.insert(id, EnergyGrid::new(id));
        id
    }

    pub fn grid(&self, id: EnergyGridId) -> Option<&EnergyGrid> {
        self.grids.get(&id)
    }

    pub fn grid_mut(&mut self, id: EnergyGridId) -> Option<&mut EnergyGrid> {
        self.grids.get_mut(&id)
    }

    pub fn remove_grid(&mut self, id: EnergyGridId) {
        self.grids.remove(&id);
    }

    /// Register a source part and add it to a grid.
    pub fn add_source(&mut self, grid_id: EnergyGridId, part: PartId, source: EnergySource) {
        self.sources.insert(part, source);
        if let Some(grid) = self.grids.get_mut(&grid_id) {
            grid.add_source(part);
        }
    }

    /// Register a storage part and add it to a grid.
    pub fn add_storage(&mut self, grid_id: EnergyGridId, part: PartId, storage: EnergyStorage) {
        self.storage.insert(part, storage);
        if let Some(grid) = self.grids.get_mut(&grid_id) {
            grid.add_storage(part);
        }
    }

    /// Remove a part from the energy system entirely (all grids and specs).
    pub fn remove_part(&mut self, part: PartId) {
        self.sources.remove(&part);
        self.storage.remove(&part);
        for grid in self.grids.values_mut() {
            grid.remove_part(part);
        }
    }

    /// Get the satisfaction ratio of a grid.
    pub fn satisfaction(&self, grid_id: EnergyGridId) -> Option<Fixed64> {
        self.grids.get(&grid_id).map(|g| g.satisfaction)
    }

    /// Balance a grid against the demand its part network aggregated this
    /// tick.
    ///
    /// 1. Sum generation from all source parts.
    /// 2. If generation >= demand: satisfaction = 1.0, charge storage with
    ///    the excess.
    /// 3. Otherwise discharge storage to cover the deficit; a creative
    ///    battery covers it outright.
    /// 4. satisfaction = supplied / demand when a deficit remains.
    /// 5. Emit brownout/restored events on state transitions.
    pub fn tick(
        &mut self,
        grid_id: EnergyGridId,
        demand: i64,
        current_tick: Ticks,
    ) -> Vec<EnergyEvent> {
        let zero = Fixed64::from_num(0);
        let one = Fixed64::from_num(1);
        let mut events = Vec::new();

        let Some(grid) = self.grids.get(&grid_id) else {
            return events;
        };
        let demand = Fixed64::from_num(demand.max(0));

        let generation: Fixed64 = grid
            .sources
            .iter()
            .filter_map(|part| self.sources.get(part))
            .map(|s| s.output)
            .fold(zero, |acc, val| acc + val);

        let storage_parts: Vec<PartId> = grid.storage.clone();
        let was_brownout = grid.was_brownout;

        let satisfaction;
        let mut deficit = zero;

        if generation >= demand {
            // Surplus (or no demand): fully satisfied, charge storage.
            satisfaction = one;
            let mut excess = generation - demand;
            for part in &storage_parts {
                if excess <= zero {
                    break;
                }
                if let Some(s) = self.storage.get_mut(part) {
                    if s.creative {
                        excess = zero;
                        continue;
                    }
                    let headroom = s.capacity - s.charge;
                    let can_charge = excess.min(s.charge_rate).min(headroom);
                    if can_charge > zero {
                        s.charge += can_charge;
                        excess -= can_charge;
                    }
                }
            }
        } else {
            // Deficit: cover from storage.
            let mut remaining = demand - generation;
            for part in &storage_parts {
                if remaining <= zero {
                    break;
                }
                if let Some(s) = self.storage.get_mut(part) {
                    if s.creative {
                        remaining = zero;
                        continue;
                    }
                    let can_discharge = remaining.min(s.charge_rate).min(s.charge);
                    if can_discharge > zero {
                        s.charge -= can_discharge;
                        remaining -= can_discharge;
                    }
                }
            }

            if remaining <= zero {
                satisfaction = one;
            } else {
                let supplied = demand - remaining;
                let ratio = supplied / demand;
                satisfaction = ratio.clamp(zero, one);
                deficit = remaining;
            }
        }

        let grid = self.grids.get_mut(&grid_id).expect("grid checked above");
        grid.satisfaction = satisfaction;

        let is_brownout = satisfaction < one;
        if is_brownout && !was_brownout {
            grid.was_brownout = true;
            events.push(EnergyEvent::GridBrownout {
                grid_id,
                deficit,
                tick: current_tick,
            });
        } else if !is_brownout && was_brownout {
            grid.was_brownout = false;
            events.push(EnergyEvent::GridRestored {
                grid_id,
                tick: current_tick,
            });
        }

        events
    }

    /// Balance a grid straight from its part network: the demand is the
    /// network's last aggregated consumption, stamped with the network's
    /// tick.
    pub fn tick_from_network(
        &mut self,
        grid_id: EnergyGridId,
        network: &Network,
    ) -> Vec<EnergyEvent> {
        self.tick(grid_id, network.last_consumption(), network.current_tick())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
