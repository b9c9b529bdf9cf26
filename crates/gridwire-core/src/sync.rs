//! Per-device aggregation, apply and broadcast.

use std::collections::BTreeMap;

use crate::device::DeviceRegistry;
use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, Ticks};
use crate::flow::FlowResult;
use crate::graph::TickGraph;
use crate::id::DevicePos;
use crate::notify::{Broadcaster, PowerUpdate, UpdateCause};
use serde::{Deserialize, Serialize};

/// Counts of what a sync pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Positions in this tick's network.
    pub updated: usize,
    /// Positions powered last tick that dropped out of the network.
    pub zeroed: usize,
}

/// Remembers which positions were powered last tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStage {
    last_synced: BTreeMap<DevicePos, Fixed64>,
}

impl SyncStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power last applied at `pos` by a sync pass, if it was in the network.
    pub fn last_power(&self, pos: DevicePos) -> Option<Fixed64> {
        self.last_synced.get(&pos).copied()
    }

    pub fn tracked(&self) -> usize {
        self.last_synced.len()
    }

    /// Push this tick's results out to devices and observers.
    ///
    /// Every position in the graph is applied and broadcast, in ascending
    /// position order, with the maximum power and merged event over its
    /// terminals. Positions synced last tick but missing now are zeroed.
    pub fn sync(
        &mut self,
        tick: Ticks,
        graph: &TickGraph,
        flow: &FlowResult,
        devices: &mut dyn DeviceRegistry,
        broadcaster: &mut dyn Broadcaster,
    ) -> SyncSummary {
        let mut current: BTreeMap<DevicePos, (Fixed64, PowerQualityEvent)> = BTreeMap::new();
        for (key, node) in graph.nodes() {
            let power = flow.power_at(key);
            let event = flow.event_at(key);
            current
                .entry(node.pos)
                .and_modify(|(p, e)| {
                    *p = (*p).max(power);
                    *e = e.merge(&event);
                })
                .or_insert((power, event));
        }

        for (&pos, &(power, event)) in &current {
            devices.apply_delivered_power(pos, power, event);
            broadcaster.notify(&PowerUpdate {
                tick,
                pos,
                power,
                event,
                cause: UpdateCause::Delivered,
            });
        }

        let mut zeroed = 0;
        for &pos in self.last_synced.keys() {
            if current.contains_key(&pos) {
                continue;
            }
            let event = PowerQualityEvent::none();
            devices.apply_delivered_power(pos, Fixed64::ZERO, event);
            broadcaster.notify(&PowerUpdate {
                tick,
                pos,
                power: Fixed64::ZERO,
                event,
                cause: UpdateCause::Disconnected,
            });
            zeroed += 1;
        }

        let updated = current.len();
        self.last_synced = current
            .into_iter()
            .map(|(pos, (power, _))| (pos, power))
            .collect();
        SyncSummary { updated, zeroed }
    }
}
