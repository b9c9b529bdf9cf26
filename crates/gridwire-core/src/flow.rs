//! Power distribution over the tick graph.
//!
//! Each generator is walked independently. Power entering a cluster is
//! given in full to every terminal of that cluster and then split evenly
//! across the device groups reachable over valid wires, scaled by the
//! group's efficiency. Within one generator's walk, converging paths merge
//! by maximum; across generators, results are summed.
//!
//! The walk uses an explicit stack over an arena of frames. A frame's
//! visited set is its chain of ancestor clusters, so sibling branches may
//! re-enter each other's clusters but no branch revisits its own ancestors.
//! Each frame carries the running minimum of the power delivered along its
//! branch, which bounds what any downstream terminal can be credited.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::FlowConfig;
use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, checked_div_64};
use crate::graph::TickGraph;
use crate::id::{ClusterKey, DevicePos, NodeKey, TerminalId};
use slotmap::SecondaryMap;
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Efficiency
// ---------------------------------------------------------------------------

/// Transfer efficiency of a group of parallel wires into one device.
///
/// `total_distance` is the summed length of the group's wires. Extra wires
/// divide the distance penalty; the result never drops below
/// `config.min_efficiency`.
pub fn efficiency(wires: u32, total_distance: Fixed64, config: &FlowConfig) -> Fixed64 {
    let wires = wires.max(1);
    let average = total_distance / Fixed64::from_num(wires);
    let normalized = checked_div_64(average, config.distance_scale).unwrap_or(Fixed64::MAX);
    let boost = Fixed64::ONE.saturating_add(
        config
            .parallel_boost
            .saturating_mul(Fixed64::from_num(wires - 1)),
    );
    let loss = checked_div_64(normalized, boost).unwrap_or(Fixed64::MAX);
    Fixed64::ONE
        .saturating_sub(loss)
        .max(config.min_efficiency)
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Tick-wide side effects shared by every generator's walk.
#[derive(Debug, Default)]
pub struct FlowEffects {
    /// Worst-case event seen at each terminal.
    pub events: SecondaryMap<NodeKey, PowerQualityEvent>,
    /// Terminals reached by power from a surging generator or through a
    /// surging device.
    pub surge_impacted: BTreeSet<NodeKey>,
}

impl FlowEffects {
    fn merge_event(&mut self, node: NodeKey, event: &PowerQualityEvent) {
        match self.events.get_mut(node) {
            Some(existing) => *existing = existing.merge(event),
            None => {
                self.events.insert(node, *event);
            }
        }
    }
}

/// Result of walking one generator.
#[derive(Debug, Default)]
pub struct Distribution {
    /// Power credited to each reached terminal (max over paths).
    pub power: SecondaryMap<NodeKey, Fixed64>,
    /// Frames expanded during the walk.
    pub expanded: u32,
    /// The expansion budget ran out before the walk finished.
    pub truncated: bool,
}

/// One generator's contribution to a tick.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorInput {
    pub node: NodeKey,
    pub offered: Fixed64,
    pub event: PowerQualityEvent,
}

/// Combined result of every generator's walk for one tick.
#[derive(Debug, Default)]
pub struct FlowResult {
    /// Delivered power per terminal, summed across generators.
    pub power: SecondaryMap<NodeKey, Fixed64>,
    pub events: SecondaryMap<NodeKey, PowerQualityEvent>,
    pub surge_impacted: BTreeSet<NodeKey>,
    /// Generators whose walk hit the expansion budget, ascending.
    pub truncated: Vec<TerminalId>,
}

impl FlowResult {
    pub fn power_at(&self, node: NodeKey) -> Fixed64 {
        self.power.get(node).copied().unwrap_or(Fixed64::ZERO)
    }

    pub fn event_at(&self, node: NodeKey) -> PowerQualityEvent {
        self.events.get(node).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeKey,
    cluster: ClusterKey,
    available: Fixed64,
    generation_included: bool,
    surge: bool,
    event: PowerQualityEvent,
    /// Minimum `available` along the branch; unbounded at the root.
    cap: Fixed64,
    parent: Option<usize>,
}

#[derive(Debug)]
struct Group {
    cluster: ClusterKey,
    target: NodeKey,
    wires: u32,
    distance: Fixed64,
}

/// Whether `cluster` is the cluster of `from` or of one of its ancestors.
fn on_branch(frames: &[Frame], from: usize, cluster: ClusterKey) -> bool {
    let mut cursor = Some(from);
    while let Some(index) = cursor {
        let frame = &frames[index];
        if frame.cluster == cluster {
            return true;
        }
        cursor = frame.parent;
    }
    false
}

/// Credit `value` and `event` to every terminal of `cluster`.
fn settle(
    graph: &TickGraph,
    cluster: ClusterKey,
    value: Fixed64,
    event: &PowerQualityEvent,
    surge: bool,
    power: &mut SecondaryMap<NodeKey, Fixed64>,
    effects: &mut FlowEffects,
) {
    let Some(cluster) = graph.cluster(cluster) else {
        return;
    };
    for &member in &cluster.members {
        match power.get_mut(member) {
            Some(existing) => *existing = (*existing).max(value),
            None => {
                power.insert(member, value);
            }
        }
        effects.merge_event(member, event);
        if surge {
            effects.surge_impacted.insert(member);
        }
    }
}

/// Walk the network from one generator terminal.
///
/// Returns an empty distribution when `offered` is not positive or the
/// node is not in the graph. Events and surge marks are accumulated into
/// `effects`, which is shared across all generators of a tick.
pub fn distribute(
    graph: &TickGraph,
    generator: NodeKey,
    offered: Fixed64,
    event: PowerQualityEvent,
    config: &FlowConfig,
    effects: &mut FlowEffects,
) -> Distribution {
    let mut out = Distribution::default();
    if offered <= Fixed64::ZERO {
        return out;
    }
    let Some(root) = graph.node(generator) else {
        return out;
    };

    let mut frames = vec![Frame {
        node: generator,
        cluster: root.cluster,
        available: offered,
        generation_included: true,
        surge: root.surging,
        event,
        cap: Fixed64::MAX,
        parent: None,
    }];
    settle(graph, root.cluster, offered, &event, root.surging, &mut out.power, effects);

    let mut stack = vec![0usize];
    let mut groups: BTreeMap<DevicePos, Group> = BTreeMap::new();

    while let Some(index) = stack.pop() {
        if config.expansion_budget.is_some_and(|budget| out.expanded >= budget) {
            out.truncated = true;
            warn!(
                generator = root.id.0,
                budget = out.expanded,
                pending = stack.len() + 1,
                "expansion budget exhausted, distribution truncated"
            );
            break;
        }
        out.expanded += 1;

        let frame = frames[index];
        let Some(node) = graph.node(frame.node) else {
            continue;
        };
        let Some(cluster) = graph.cluster(frame.cluster) else {
            continue;
        };

        let mut total = frame.available;
        if !frame.generation_included && node.is_generator() {
            total = total.saturating_add(node.offered.max(Fixed64::ZERO));
        }

        // Edges leaving the cluster have exactly one end inside it, so each
        // physical wire is seen once.
        groups.clear();
        for &member in &cluster.members {
            let Some(source) = graph.node(member) else {
                continue;
            };
            for &edge_key in source.edges() {
                let Some(edge) = graph.edge(edge_key) else {
                    continue;
                };
                let Some((role, other, other_role)) = edge.view_from(member) else {
                    continue;
                };
                let Some(target) = graph.node(other) else {
                    continue;
                };
                if target.cluster == frame.cluster {
                    continue;
                }
                if !role.feeds(other_role, target.pos == source.pos) {
                    continue;
                }
                let group = groups.entry(target.pos).or_insert(Group {
                    cluster: target.cluster,
                    target: other,
                    wires: 0,
                    distance: Fixed64::ZERO,
                });
                group.wires += 1;
                group.distance = group.distance.saturating_add(edge.distance);
            }
        }
        groups.retain(|_, group| !on_branch(&frames, index, group.cluster));
        if groups.is_empty() {
            continue;
        }

        let per_group = total / Fixed64::from_num(groups.len());
        let first_child = frames.len();
        for group in groups.values() {
            let efficiency = efficiency(group.wires, group.distance, config);
            let delivered = per_group * efficiency;
            if delivered <= Fixed64::ZERO {
                continue;
            }
            let Some(target) = graph.node(group.target) else {
                continue;
            };
            let child = Frame {
                node: group.target,
                cluster: group.cluster,
                available: delivered,
                generation_included: false,
                surge: frame.surge || target.surging,
                event: frame.event.attenuate(efficiency, config.event_attenuation),
                cap: frame.cap.min(delivered),
                parent: Some(index),
            };
            settle(
                graph,
                child.cluster,
                child.cap,
                &child.event,
                child.surge,
                &mut out.power,
                effects,
            );
            frames.push(child);
        }
        stack.extend((first_child..frames.len()).rev());
    }

    trace!(
        generator = root.id.0,
        frames = frames.len(),
        expanded = out.expanded,
        reached = out.power.len(),
        "distributed generator output"
    );
    out
}

/// Walk every generator and sum their contributions.
pub fn distribute_all(
    graph: &TickGraph,
    generators: &[GeneratorInput],
    config: &FlowConfig,
) -> FlowResult {
    let mut effects = FlowEffects::default();
    let mut result = FlowResult::default();

    for input in generators {
        let dist = distribute(
            graph,
            input.node,
            input.offered,
            input.event,
            config,
            &mut effects,
        );
        if dist.truncated {
            if let Some(node) = graph.node(input.node) {
                result.truncated.push(node.id);
            }
        }
        for (node, value) in dist.power {
            match result.power.get_mut(node) {
                Some(sum) => *sum = sum.saturating_add(value),
                None => {
                    result.power.insert(node, value);
                }
            }
        }
    }

    result.truncated.sort_unstable();
    result.events = effects.events;
    result.surge_impacted = effects.surge_impacted;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PowerRole;
    use crate::test_utils::*;
    use tracing_test::traced_test;

    fn run(s: &Scenario, generator: DevicePos, event: PowerQualityEvent) -> (TickGraph, FlowResult) {
        run_with(s, generator, event, &FlowConfig::default())
    }

    fn run_with(
        s: &Scenario,
        generator: DevicePos,
        event: PowerQualityEvent,
        config: &FlowConfig,
    ) -> (TickGraph, FlowResult) {
        let graph = s.build().graph;
        let node = graph.node_by_terminal(s.primary(generator)).unwrap();
        let offered = graph.node(node).unwrap().offered;
        let result = distribute_all(
            &graph,
            &[GeneratorInput {
                node,
                offered,
                event,
            }],
            config,
        );
        (graph, result)
    }

    fn power(s: &Scenario, graph: &TickGraph, result: &FlowResult, pos: DevicePos) -> Fixed64 {
        result.power_at(graph.node_by_terminal(s.primary(pos)).unwrap())
    }

    #[test]
    fn efficiency_single_wire() {
        let config = FlowConfig::default();
        assert_approx(efficiency(1, fixed(10.0), &config), 0.9);
        assert_approx(efficiency(1, Fixed64::ZERO, &config), 1.0);
    }

    #[test]
    fn efficiency_parallel_wires_boost() {
        let config = FlowConfig::default();
        // avg 10 -> 0.1 normalized, boost 1.35
        assert_approx(efficiency(2, fixed(20.0), &config), 1.0 - 0.1 / 1.35);
    }

    #[test]
    fn efficiency_floor() {
        let config = FlowConfig::default();
        assert_eq!(efficiency(1, fixed(500.0), &config), config.min_efficiency);
    }

    #[test]
    fn zero_offer_is_empty() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(0.0));
        let b = s.place(DevicePos::new(10, 0, 0), MockDevice::power_box());
        s.connect(g, b);

        let graph = s.build().graph;
        let node = graph.node_by_terminal(s.primary(g)).unwrap();
        let mut effects = FlowEffects::default();
        let dist = distribute(
            &graph,
            node,
            Fixed64::ZERO,
            PowerQualityEvent::none(),
            &FlowConfig::default(),
            &mut effects,
        );
        assert!(dist.power.is_empty());
        assert_eq!(dist.expanded, 0);
        assert!(effects.events.is_empty());
    }

    #[test]
    fn generator_keeps_full_output() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let b = s.place(DevicePos::new(10, 0, 0), MockDevice::power_box());
        s.connect(g, b);

        let (graph, result) = run(&s, g, PowerQualityEvent::none());
        assert_eq!(power(&s, &graph, &result, g), fixed(100.0));
        assert_approx(power(&s, &graph, &result, b), 90.0);
    }

    #[test]
    fn chain_compounds_efficiency() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let p1 = s.place(DevicePos::new(10, 0, 0), MockDevice::pole());
        let p2 = s.place(DevicePos::new(20, 0, 0), MockDevice::pole());
        let b = s.place(DevicePos::new(30, 0, 0), MockDevice::power_box());
        s.connect(g, p1);
        s.connect(p1, p2);
        s.connect(p2, b);

        let (graph, result) = run(&s, g, PowerQualityEvent::none());
        assert_approx(power(&s, &graph, &result, p1), 90.0);
        assert_approx(power(&s, &graph, &result, p2), 81.0);
        assert_approx(power(&s, &graph, &result, b), 72.9);
    }

    #[test]
    fn input_cannot_feed_onward() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let b = s.place(DevicePos::new(10, 0, 0), MockDevice::power_box());
        let p = s.place(DevicePos::new(20, 0, 0), MockDevice::pole());
        s.connect(g, b);
        s.connect(b, p);

        let (graph, result) = run(&s, g, PowerQualityEvent::none());
        assert_approx(power(&s, &graph, &result, b), 90.0);
        assert_eq!(power(&s, &graph, &result, p), Fixed64::ZERO);
    }

    #[test]
    fn downstream_generator_is_clipped() {
        let mut s = Scenario::new();
        let g1 = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let g2 = s.place(DevicePos::new(10, 0, 0), MockDevice::turbine(50.0));
        let b = s.place(DevicePos::new(20, 0, 0), MockDevice::power_box());
        s.connect_roles(
            s.primary(g1),
            PowerRole::Output,
            s.primary(g2),
            PowerRole::Bidirectional,
        );
        s.connect(g2, b);

        let (graph, result) = run(&s, g1, PowerQualityEvent::none());
        // g2 adds its own output to what it relays, but the box is credited
        // no more than what reached g2.
        assert_approx(power(&s, &graph, &result, g2), 90.0);
        assert_approx(power(&s, &graph, &result, b), 90.0);
    }

    #[test]
    fn cluster_members_share_power() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let p = s.place(DevicePos::new(10, 0, 0), MockDevice::pole());
        let b = s.place(DevicePos::new(20, 0, 0), MockDevice::power_box());
        s.connect(g, p);
        let out = s.extra_terminal(p);
        s.connect_terminals(out, s.primary(b));

        let (graph, result) = run(&s, g, PowerQualityEvent::none());
        let first = result.power_at(graph.node_by_terminal(s.primary(p)).unwrap());
        let second = result.power_at(graph.node_by_terminal(out).unwrap());
        assert_eq!(first, second);
        assert_approx(power(&s, &graph, &result, b), 81.0);
    }

    #[test]
    fn surge_marks_reached_terminals() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0).surging());
        let p = s.place(DevicePos::new(10, 0, 0), MockDevice::pole());
        let b = s.place(DevicePos::new(20, 0, 0), MockDevice::power_box());
        s.connect(g, p);
        s.connect(p, b);

        let (graph, result) = run(&s, g, PowerQualityEvent::none());
        assert_eq!(result.surge_impacted.len(), 3);
        let bn = graph.node_by_terminal(s.primary(b)).unwrap();
        assert!(result.surge_impacted.contains(&bn));
        // Surge does not alter the event.
        assert_eq!(result.event_at(bn), PowerQualityEvent::none());
    }

    #[traced_test]
    #[test]
    fn budget_truncates_walk() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let p1 = s.place(DevicePos::new(10, 0, 0), MockDevice::pole());
        let p2 = s.place(DevicePos::new(20, 0, 0), MockDevice::pole());
        s.connect(g, p1);
        s.connect(p1, p2);

        let config = FlowConfig {
            expansion_budget: Some(1),
            ..FlowConfig::default()
        };
        let (graph, result) = run_with(&s, g, PowerQualityEvent::none(), &config);
        assert_eq!(result.truncated, vec![s.primary(g)]);
        // The root's direct targets are credited before the budget runs out.
        assert_approx(power(&s, &graph, &result, p1), 90.0);
        assert_eq!(power(&s, &graph, &result, p2), Fixed64::ZERO);
        assert!(logs_contain("expansion budget exhausted"));
    }

    #[test]
    fn event_attenuates_per_hop() {
        let mut s = Scenario::new();
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let b = s.place(DevicePos::new(10, 0, 0), MockDevice::power_box());
        s.connect(g, b);

        let event = PowerQualityEvent::new(fixed(0.8), 3, true, fixed(0.5));
        let (graph, result) = run(&s, g, event);
        let gn = graph.node_by_terminal(s.primary(g)).unwrap();
        let bn = graph.node_by_terminal(s.primary(b)).unwrap();
        assert_eq!(result.event_at(gn), event);
        let seen = result.event_at(bn);
        assert_eq!(seen.surge_duration(), 2);
        assert!(seen.disconnect_active());
        assert!(seen.surge_severity() < event.surge_severity());
    }
}
