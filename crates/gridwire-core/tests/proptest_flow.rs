//! Property-based tests for the power engine.
//!
//! Uses proptest to generate random device layouts and wire lists, then
//! verifies the distribution invariants hold for every tick.

use gridwire_core::engine::PowerEngine;
use gridwire_core::fixed::Fixed64;
use gridwire_core::id::*;
use gridwire_core::test_utils::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
struct Layout {
    /// (kind index, x, z, output)
    devices: Vec<(u8, i32, i32, u16)>,
    /// Pairs of device indices; out-of-range indices wrap.
    wires: Vec<(usize, usize)>,
    /// Devices that get a second terminal, wired like the first.
    doubled: Vec<usize>,
}

fn arb_layout(max_devices: usize) -> impl Strategy<Value = Layout> {
    (
        proptest::collection::vec((0..4u8, -40..40i32, -40..40i32, 1..500u16), 2..=max_devices),
        proptest::collection::vec((0..64usize, 0..64usize), 1..=max_devices * 2),
        proptest::collection::vec(0..64usize, 0..3),
    )
        .prop_map(|(devices, wires, doubled)| Layout {
            devices,
            wires,
            doubled,
        })
}

fn build(layout: &Layout) -> Scenario {
    let mut s = Scenario::new();
    let mut positions = Vec::new();
    for &(kind, x, z, output) in &layout.devices {
        let pos = DevicePos::new(x, 0, z);
        if positions.contains(&pos) {
            continue;
        }
        let device = match kind {
            0 => MockDevice::turbine(f64::from(output)),
            1 => MockDevice::pole(),
            2 => MockDevice::cabin(),
            _ => MockDevice::power_box(),
        };
        positions.push(s.place(pos, device));
    }
    let n = positions.len();
    let extras: Vec<_> = layout
        .doubled
        .iter()
        .map(|&i| {
            let pos = positions[i % n];
            (pos, s.extra_terminal(pos))
        })
        .collect();

    for &(a, b) in &layout.wires {
        let (a, b) = (positions[a % n], positions[b % n]);
        s.connect(a, b);
        for &(pos, extra) in &extras {
            if pos == a {
                s.connect_terminals(extra, s.primary(b));
            }
        }
    }
    s
}

/// Sum of what every generator terminal in the network offers.
fn total_offered(s: &Scenario) -> Fixed64 {
    let graph = s.build().graph;
    graph
        .generators()
        .into_iter()
        .filter_map(|key| graph.node(key))
        .fold(Fixed64::ZERO, |sum, node| sum + node.offered)
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn delivered_power_is_non_negative(layout in arb_layout(10)) {
        let mut s = build(&layout);
        let report = s.tick(&mut PowerEngine::new());
        for power in report.power.values() {
            prop_assert!(*power >= Fixed64::ZERO);
        }
    }

    #[test]
    fn cluster_terminals_agree(layout in arb_layout(10)) {
        let mut s = build(&layout);
        // Storms make generator events non-neutral so event equality is tested.
        s.weather = FixedWeather::stormy();
        let graph = s.build().graph;
        let report = s.tick(&mut PowerEngine::new());

        let mut by_pos: BTreeMap<DevicePos, (Fixed64, _)> = BTreeMap::new();
        for (_, node) in graph.nodes() {
            let power = report.power_for(node.id);
            let event = report.event_for(node.id);
            match by_pos.get(&node.pos) {
                Some(&(p, e)) => {
                    prop_assert_eq!(p, power);
                    prop_assert_eq!(e, event);
                }
                None => {
                    by_pos.insert(node.pos, (power, event));
                }
            }
        }
    }

    #[test]
    fn terminals_never_exceed_total_generation(layout in arb_layout(10)) {
        let mut s = build(&layout);
        let cap = total_offered(&s);
        let report = s.tick(&mut PowerEngine::new());
        for power in report.power.values() {
            prop_assert!(*power <= cap);
        }
    }

    #[test]
    fn ticks_are_deterministic(layout in arb_layout(8), ticks in 1..6usize) {
        let mut a = build(&layout);
        let mut b = build(&layout);
        a.weather = FixedWeather::new(19.0, 0.8);
        b.weather = FixedWeather::new(19.0, 0.8);
        let mut ea = PowerEngine::new();
        let mut eb = PowerEngine::new();
        for _ in 0..ticks {
            prop_assert_eq!(a.tick(&mut ea), b.tick(&mut eb));
        }
    }

    #[test]
    fn devices_match_report(layout in arb_layout(10)) {
        let mut s = build(&layout);
        let graph = s.build().graph;
        let report = s.tick(&mut PowerEngine::new());
        for (_, node) in graph.nodes() {
            prop_assert_eq!(s.world.delivered(node.pos), report.power_for(node.id));
        }
    }
}
