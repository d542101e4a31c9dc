//! Cross-crate integration: the part network aggregates consumption each
//! scheduled tick, and the energy module balances that demand against
//! sources and storage.

use conduit_core::container::place_part;
use conduit_core::counter::GlobalCounters;
use conduit_core::network::Network;
use conduit_core::path::discover_cluster;
use conduit_core::pos::{BlockPos, DimPos, Side, WorldId};
use conduit_core::test_utils::*;
use conduit_core::world::WorldAccess;
use conduit_energy::{
    EnergyEvent, EnergyGridId, EnergyModule, EnergySource, EnergyStorage, Fixed64,
};

fn at(x: i32) -> DimPos {
    DimPos::new(WorldId(0), BlockPos::new(x, 0, 0))
}

fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Three consumer probes (rates 5, 7, 8) on one network, with a generator
/// part backing an energy grid.
fn build() -> (MapWorld, GlobalCounters, Network, EnergyModule, EnergyGridId) {
    let mut world = MapWorld::new(1);
    let mut counters = GlobalCounters::new();
    let mut network = Network::new();
    for (x, rate) in [(0, 5), (1, 7), (2, 8)] {
        world.add_cable(at(x));
        place_part(
            Some(&mut network),
            &mut world,
            &mut counters,
            at(x),
            Side::Up,
            probe_with_rate(rate),
        )
        .unwrap();
    }
    let cluster = discover_cluster(&world, at(0)).unwrap();
    assert_eq!(cluster.len(), 3);

    let mut energy = EnergyModule::new();
    let grid = energy.create_grid();
    let generator_id = world.container(at(0)).unwrap().state(Side::Up).unwrap().id();
    energy.add_source(grid, generator_id, EnergySource { output: fixed(20.0) });

    network.initialize(&mut world, false).unwrap();
    (world, counters, network, energy, grid)
}

#[test]
fn network_demand_feeds_the_grid() {
    let (mut world, _counters, mut network, mut energy, grid) = build();

    network.tick(&mut world).unwrap();
    assert_eq!(network.last_consumption(), 20);

    let events = energy.tick_from_network(grid, &network);
    assert!(events.is_empty());
    assert_eq!(energy.satisfaction(grid), Some(fixed(1.0)));
}

#[test]
fn disabling_a_part_lowers_demand() {
    let (mut world, _counters, mut network, mut energy, grid) = build();

    world
        .container_mut(at(2))
        .unwrap()
        .state_mut(Side::Up)
        .unwrap()
        .set_enabled(false);
    network.tick(&mut world).unwrap();
    assert_eq!(network.last_consumption(), 12);

    let events = energy.tick_from_network(grid, &network);
    assert!(events.is_empty());
    assert_eq!(energy.satisfaction(grid), Some(fixed(1.0)));
}

#[test]
fn overload_browns_out_and_recovers() {
    let (mut world, mut counters, mut network, mut energy, grid) = build();

    // A fourth consumer pushes demand past generation.
    world.add_cable(at(3));
    place_part(
        Some(&mut network),
        &mut world,
        &mut counters,
        at(3),
        Side::Up,
        probe_with_rate(20),
    )
    .unwrap();

    network.tick(&mut world).unwrap();
    assert_eq!(network.last_consumption(), 40);
    let events = energy.tick_from_network(grid, &network);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], EnergyEvent::GridBrownout { deficit, .. } if deficit == fixed(20.0)));
    assert_eq!(energy.satisfaction(grid), Some(fixed(0.5)));

    // Remove the overload: the grid recovers on the next balance.
    world
        .container_mut(at(3))
        .unwrap()
        .state_mut(Side::Up)
        .unwrap()
        .set_enabled(false);
    network.tick(&mut world).unwrap();
    let events = energy.tick_from_network(grid, &network);
    assert!(matches!(events[..], [EnergyEvent::GridRestored { .. }]));
}

#[test]
fn batteries_bridge_a_generation_gap() {
    let (mut world, _counters, mut network, mut energy, grid) = build();

    let battery_id = world.container(at(1)).unwrap().state(Side::Up).unwrap().id();
    let mut battery = EnergyStorage::new(fixed(100.0), fixed(50.0));
    battery.charge = fixed(100.0);
    energy.add_storage(grid, battery_id, battery);

    // Lose the generator: storage covers the full 20 per tick.
    energy.remove_part(
        world.container(at(0)).unwrap().state(Side::Up).unwrap().id(),
    );
    for _ in 0..5 {
        network.tick(&mut world).unwrap();
        let events = energy.tick_from_network(grid, &network);
        assert!(events.is_empty());
        assert_eq!(energy.satisfaction(grid), Some(fixed(1.0)));
    }
    assert_eq!(energy.storage[&battery_id].charge, fixed(0.0));

    // The battery is drained: the next tick browns out completely.
    network.tick(&mut world).unwrap();
    let events = energy.tick_from_network(grid, &network);
    assert!(matches!(events[..], [EnergyEvent::GridBrownout { .. }]));
    assert_eq!(energy.satisfaction(grid), Some(fixed(0.0)));
}

#[test]
fn creative_battery_carries_any_network() {
    let (mut world, _counters, mut network, mut energy, grid) = build();
    energy.remove_part(
        world.container(at(0)).unwrap().state(Side::Up).unwrap().id(),
    );
    let battery_id = world.container(at(1)).unwrap().state(Side::Up).unwrap().id();
    energy.add_storage(grid, battery_id, EnergyStorage::creative());

    for _ in 0..10 {
        network.tick(&mut world).unwrap();
        let events = energy.tick_from_network(grid, &network);
        assert!(events.is_empty());
        assert_eq!(energy.satisfaction(grid), Some(fixed(1.0)));
    }
}
