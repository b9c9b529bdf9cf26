//! Wire records and the edge repository interface.
//!
//! Wire records are the only durable state the engine depends on. They are
//! created by external tooling and removed either externally or by the
//! engine when an endpoint no longer resolves to a matching device.

use std::collections::BTreeMap;

use crate::fixed::Fixed64;
use crate::id::{DeviceKind, DevicePos, PowerRole, TerminalId};
use serde::{Deserialize, Serialize};

/// One end of a wire as recorded when the wire was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnd {
    pub terminal: TerminalId,
    pub pos: DevicePos,
    pub kind: DeviceKind,
    pub role: PowerRole,
}

impl WireEnd {
    pub fn new(terminal: TerminalId, pos: DevicePos, kind: DeviceKind, role: PowerRole) -> Self {
        Self {
            terminal,
            pos,
            kind,
            role,
        }
    }
}

/// A wire between two terminals.
///
/// The pair is unordered for connectivity purposes; `start`/`end` only
/// preserve the order in which the wire was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEdge {
    pub start: WireEnd,
    pub end: WireEnd,
    /// Straight-line length between the recorded positions, fixed at creation.
    pub distance: Fixed64,
}

impl WireEdge {
    /// Create a wire, measuring its length from the recorded positions.
    ///
    /// Lengths beyond the fixed-point range saturate.
    pub fn new(start: WireEnd, end: WireEnd) -> Self {
        let distance = Fixed64::saturating_from_num(start.pos.distance(end.pos));
        Self {
            start,
            end,
            distance,
        }
    }

    /// Normalized key for the unordered terminal pair.
    pub fn pair_key(&self) -> (TerminalId, TerminalId) {
        let (a, b) = (self.start.terminal, self.end.terminal);
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn touches(&self, terminal: TerminalId) -> bool {
        self.start.terminal == terminal || self.end.terminal == terminal
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Durable store of wire records, consumed once per tick.
pub trait EdgeRepository {
    /// Every wire currently recorded.
    fn all_edges(&self) -> Vec<WireEdge>;

    /// Remove every wire touching any of the given terminals and return the
    /// removed records.
    fn remove_edges(&mut self, terminals: &[TerminalId]) -> Vec<WireEdge>;
}

/// In-memory [`EdgeRepository`] keyed by placement order `(start, end)`.
///
/// Placing a wire with the same ordered terminal pair replaces the old
/// record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireStore {
    wires: BTreeMap<(TerminalId, TerminalId), WireEdge>,
}

impl WireStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a wire, returning the record it replaced, if any.
    pub fn insert(&mut self, edge: WireEdge) -> Option<WireEdge> {
        self.wires
            .insert((edge.start.terminal, edge.end.terminal), edge)
    }

    /// Remove the wire placed from `start` to `end`.
    pub fn remove(&mut self, start: TerminalId, end: TerminalId) -> Option<WireEdge> {
        self.wires.remove(&(start, end))
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WireEdge> {
        self.wires.values()
    }
}

impl EdgeRepository for WireStore {
    fn all_edges(&self) -> Vec<WireEdge> {
        self.wires.values().cloned().collect()
    }

    fn remove_edges(&mut self, terminals: &[TerminalId]) -> Vec<WireEdge> {
        let doomed: Vec<_> = self
            .wires
            .iter()
            .filter(|(_, edge)| terminals.iter().any(|t| edge.touches(*t)))
            .map(|(key, _)| *key)
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| self.wires.remove(&key))
            .collect()
    }
}
