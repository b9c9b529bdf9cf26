//! Tick-local wire graph.
//!
//! Rebuilt from the durable wire list at the start of every tick and thrown
//! away at the end. Building resolves each wire endpoint against the live
//! device registry; endpoints that no longer resolve to a device of the
//! recorded kind are collected as stale and their wires are skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::device::DeviceRegistry;
use crate::fixed::Fixed64;
use crate::id::{ClusterKey, DeviceKind, DevicePos, EdgeKey, NodeKey, PowerRole, TerminalId};
use crate::wire::{WireEdge, WireEnd};
use slotmap::SlotMap;
use tracing::warn;

// ---------------------------------------------------------------------------
// Graph elements
// ---------------------------------------------------------------------------

/// A resolved terminal.
///
/// Device state is sampled once when the node is created, so every stage of
/// a tick sees the same offered output and surge flag.
#[derive(Debug, Clone)]
pub struct TerminalNode {
    pub id: TerminalId,
    pub pos: DevicePos,
    pub kind: DeviceKind,
    pub cluster: ClusterKey,
    pub offered: Fixed64,
    pub surging: bool,
    edges: Vec<EdgeKey>,
}

impl TerminalNode {
    pub fn is_generator(&self) -> bool {
        self.kind.is_generator()
    }

    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }
}

/// A wire between two resolved terminals.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub a: NodeKey,
    pub b: NodeKey,
    pub a_role: PowerRole,
    pub b_role: PowerRole,
    pub distance: Fixed64,
}

impl GraphEdge {
    /// Seen from `from`: `(this end's role, other node, other end's role)`.
    pub fn view_from(&self, from: NodeKey) -> Option<(PowerRole, NodeKey, PowerRole)> {
        if self.a == from {
            Some((self.a_role, self.b, self.b_role))
        } else if self.b == from {
            Some((self.b_role, self.a, self.a_role))
        } else {
            None
        }
    }
}

/// All terminals sharing one device position.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub pos: DevicePos,
    pub members: Vec<NodeKey>,
}

// ---------------------------------------------------------------------------
// TickGraph
// ---------------------------------------------------------------------------

/// Result of building a graph: the graph plus terminals to report as stale.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: TickGraph,
    /// Terminals whose wires should be removed, ascending, each once.
    pub stale: Vec<TerminalId>,
}

/// The resolved network for one tick.
#[derive(Debug, Default)]
pub struct TickGraph {
    nodes: SlotMap<NodeKey, TerminalNode>,
    edges: SlotMap<EdgeKey, GraphEdge>,
    clusters: SlotMap<ClusterKey, Cluster>,
    by_terminal: BTreeMap<TerminalId, NodeKey>,
    by_pos: BTreeMap<DevicePos, ClusterKey>,
    by_pair: HashMap<(TerminalId, TerminalId), EdgeKey>,
}

struct Builder<'a> {
    graph: TickGraph,
    devices: &'a dyn DeviceRegistry,
    failed: BTreeSet<TerminalId>,
}

impl Builder<'_> {
    /// Resolve a wire end to a node, creating it on first reference.
    ///
    /// A terminal is checked once per tick, against the first wire that
    /// names it. Once it has a node, later wires reuse it regardless of what
    /// they recorded. Once it has failed, later wires naming it are skipped
    /// even if their own record matches the device; the terminal is reported
    /// stale and every wire touching it is removed anyway.
    fn resolve(&mut self, end: &WireEnd) -> Option<NodeKey> {
        if let Some(&key) = self.graph.by_terminal.get(&end.terminal) {
            return Some(key);
        }
        if self.failed.contains(&end.terminal) {
            return None;
        }

        let Some(device) = self.devices.device(end.pos) else {
            warn!(terminal = end.terminal.0, pos = ?end.pos, "no device found for terminal");
            self.failed.insert(end.terminal);
            return None;
        };
        let found = device.kind();
        if found != end.kind {
            warn!(
                terminal = end.terminal.0,
                pos = ?end.pos,
                recorded = end.kind.name(),
                found = found.name(),
                "device kind mismatch for terminal"
            );
            self.failed.insert(end.terminal);
            return None;
        }

        let offered = device.offered_output();
        let surging = device.is_locally_surging();
        let graph = &mut self.graph;
        let cluster = *graph.by_pos.entry(end.pos).or_insert_with(|| {
            graph.clusters.insert(Cluster {
                pos: end.pos,
                members: Vec::new(),
            })
        });
        let key = graph.nodes.insert(TerminalNode {
            id: end.terminal,
            pos: end.pos,
            kind: found,
            cluster,
            offered,
            surging,
            edges: Vec::new(),
        });
        graph.clusters[cluster].members.push(key);
        graph.by_terminal.insert(end.terminal, key);
        Some(key)
    }

    fn add_wire(&mut self, wire: &WireEdge) {
        // Both ends are always attempted so each stale terminal gets reported.
        let a = self.resolve(&wire.start);
        let b = self.resolve(&wire.end);
        let (Some(a), Some(b)) = (a, b) else {
            return;
        };

        let edge = GraphEdge {
            a,
            b,
            a_role: wire.start.role,
            b_role: wire.end.role,
            distance: wire.distance,
        };
        let graph = &mut self.graph;
        match graph.by_pair.get(&wire.pair_key()) {
            Some(&existing) => graph.edges[existing] = edge,
            None => {
                let key = graph.edges.insert(edge);
                graph.by_pair.insert(wire.pair_key(), key);
                graph.nodes[a].edges.push(key);
                if a != b {
                    graph.nodes[b].edges.push(key);
                }
            }
        }
    }
}

impl TickGraph {
    /// Build this tick's graph from the wire list. O(E).
    pub fn build(wires: &[WireEdge], devices: &dyn DeviceRegistry) -> BuildOutcome {
        let mut builder = Builder {
            graph: TickGraph::default(),
            devices,
            failed: BTreeSet::new(),
        };
        for wire in wires {
            builder.add_wire(wire);
        }
        let stale = builder
            .failed
            .into_iter()
            .filter(|t| t.is_assigned())
            .collect();
        BuildOutcome {
            graph: builder.graph,
            stale,
        }
    }

    pub fn node(&self, key: NodeKey) -> Option<&TerminalNode> {
        self.nodes.get(key)
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&GraphEdge> {
        self.edges.get(key)
    }

    pub fn cluster(&self, key: ClusterKey) -> Option<&Cluster> {
        self.clusters.get(key)
    }

    pub fn node_by_terminal(&self, terminal: TerminalId) -> Option<NodeKey> {
        self.by_terminal.get(&terminal).copied()
    }

    pub fn cluster_at(&self, pos: DevicePos) -> Option<ClusterKey> {
        self.by_pos.get(&pos).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &TerminalNode)> {
        self.nodes.iter()
    }

    pub fn clusters(&self) -> impl Iterator<Item = (ClusterKey, &Cluster)> {
        self.clusters.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn contains_terminal(&self, terminal: TerminalId) -> bool {
        self.by_terminal.contains_key(&terminal)
    }

    /// Generator terminals with positive offered output, by ascending id.
    pub fn generators(&self) -> Vec<NodeKey> {
        self.by_terminal
            .values()
            .copied()
            .filter(|&key| {
                let node = &self.nodes[key];
                node.is_generator() && node.offered > Fixed64::ZERO
            })
            .collect()
    }
}
