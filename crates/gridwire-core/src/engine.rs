//! The per-tick power pipeline.
//!
//! [`PowerEngine::tick`] runs one full recomputation:
//!
//! 1. **Build**: resolve the wire list against live devices. Wires with a
//!    stale endpoint are skipped and reported back for removal.
//! 2. **Synthesize**: pick each generator's power-quality event, reusing
//!    running events and sampling weather for fresh ones.
//! 3. **Distribute**: walk every generator's output through the network.
//! 4. **Sync**: apply per-device results and broadcast them, zeroing
//!    devices that dropped out of the network.
//!
//! Only the synthesizer and the sync stage keep state between ticks; the
//! graph and flow results are rebuilt from scratch every tick.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConfigError, EngineConfig};
use crate::device::{DeviceRegistry, WeatherOracle};
use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, Ticks};
use crate::flow::{GeneratorInput, distribute_all};
use crate::graph::{BuildOutcome, TickGraph};
use crate::id::{DevicePos, TerminalId};
use crate::notify::Broadcaster;
use crate::sync::SyncStage;
use crate::synth::EventSynthesizer;
use crate::wire::EdgeRepository;
use tracing::debug;

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// The host collaborators a tick reads from and writes to.
pub struct TickContext<'a> {
    pub devices: &'a mut dyn DeviceRegistry,
    pub edges: &'a mut dyn EdgeRepository,
    pub weather: &'a mut dyn WeatherOracle,
    pub broadcaster: &'a mut dyn Broadcaster,
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What one tick computed and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Ticks,
    /// Terminals resolved into this tick's graph.
    pub terminals: usize,
    /// Distinct wires in this tick's graph.
    pub edges: usize,
    /// Terminals whose wires were reported for removal, ascending.
    pub stale_terminals: Vec<TerminalId>,
    /// Generators that offered power.
    pub generators: usize,
    /// Device positions applied and broadcast as part of the network.
    pub updated: usize,
    /// Device positions zeroed after dropping out of the network.
    pub zeroed: usize,
    pub surge_impacted: BTreeSet<TerminalId>,
    /// Delivered power for every terminal in the graph.
    pub power: BTreeMap<TerminalId, Fixed64>,
    /// Events for every terminal reached by a generator.
    pub events: BTreeMap<TerminalId, PowerQualityEvent>,
    /// Generators whose walk hit the expansion budget.
    pub truncated: Vec<TerminalId>,
}

impl TickReport {
    /// Delivered power at `terminal`, zero if it was not in the graph.
    pub fn power_for(&self, terminal: TerminalId) -> Fixed64 {
        self.power.get(&terminal).copied().unwrap_or(Fixed64::ZERO)
    }

    /// Event at `terminal`, neutral if none reached it.
    pub fn event_for(&self, terminal: TerminalId) -> PowerQualityEvent {
        self.events.get(&terminal).copied().unwrap_or_default()
    }

    pub fn is_truncated(&self) -> bool {
        !self.truncated.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PowerEngine
// ---------------------------------------------------------------------------

/// Owns the cross-tick state of the power network.
#[derive(Debug, Clone)]
pub struct PowerEngine {
    pub(crate) config: EngineConfig,
    pub(crate) synthesizer: EventSynthesizer,
    pub(crate) sync: SyncStage,
    pub(crate) tick: Ticks,
}

impl Default for PowerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerEngine {
    /// An engine with the default configuration.
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            synthesizer: EventSynthesizer::new(config.seed),
            sync: SyncStage::new(),
            tick: 0,
            config,
        }
    }

    /// An engine with a validated configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            synthesizer: EventSynthesizer::new(config.seed),
            sync: SyncStage::new(),
            tick: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The number of the next tick to run.
    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    pub fn synthesizer(&self) -> &EventSynthesizer {
        &self.synthesizer
    }

    pub fn sync_stage(&self) -> &SyncStage {
        &self.sync
    }

    /// Run one tick.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> TickReport {
        let tick = self.tick;
        self.tick += 1;

        let wires = ctx.edges.all_edges();
        let BuildOutcome { graph, stale } = TickGraph::build(&wires, &*ctx.devices);
        if !stale.is_empty() {
            let removed = ctx.edges.remove_edges(&stale);
            debug!(
                tick,
                terminals = stale.len(),
                wires = removed.len(),
                "removed stale wires"
            );
        }

        // One event per generator device, shared by all of its terminals.
        let mut device_events: BTreeMap<DevicePos, PowerQualityEvent> = BTreeMap::new();
        let mut inputs = Vec::new();
        for key in graph.generators() {
            let Some(node) = graph.node(key) else {
                continue;
            };
            let event = match device_events.get(&node.pos) {
                Some(&event) => event,
                None => {
                    let event =
                        self.synthesizer
                            .event_for(node.pos, &mut *ctx.weather, &self.config.synth);
                    device_events.insert(node.pos, event);
                    event
                }
            };
            inputs.push(GeneratorInput {
                node: key,
                offered: node.offered,
                event,
            });
        }
        self.synthesizer.prune(|pos| graph.cluster_at(pos).is_some());

        let flow = distribute_all(&graph, &inputs, &self.config.flow);
        let summary = self
            .sync
            .sync(tick, &graph, &flow, &mut *ctx.devices, &mut *ctx.broadcaster);

        let mut report = TickReport {
            tick,
            terminals: graph.node_count(),
            edges: graph.edge_count(),
            stale_terminals: stale,
            generators: inputs.len(),
            updated: summary.updated,
            zeroed: summary.zeroed,
            truncated: flow.truncated.clone(),
            ..TickReport::default()
        };
        for (key, node) in graph.nodes() {
            report.power.insert(node.id, flow.power_at(key));
            if let Some(event) = flow.events.get(key) {
                report.events.insert(node.id, *event);
            }
            if flow.surge_impacted.contains(&key) {
                report.surge_impacted.insert(node.id);
            }
        }

        debug!(
            tick,
            terminals = report.terminals,
            edges = report.edges,
            generators = report.generators,
            updated = report.updated,
            zeroed = report.zeroed,
            "power tick complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn tick_counter_advances() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        assert_eq!(s.tick(&mut engine).tick, 0);
        assert_eq!(s.tick(&mut engine).tick, 1);
        assert_eq!(engine.current_tick(), 2);
    }

    #[test]
    fn empty_network_is_quiet() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        let report = s.tick(&mut engine);
        assert_eq!(report.terminals, 0);
        assert_eq!(report.updated, 0);
        assert!(s.recorder.updates.is_empty());
    }

    #[test]
    fn with_config_validates() {
        let mut config = EngineConfig::default();
        config.flow.expansion_budget = Some(0);
        assert_eq!(
            PowerEngine::with_config(config).err(),
            Some(ConfigError::ZeroBudget)
        );
    }

    #[test]
    fn report_covers_every_terminal() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        let (g, b) = chain(&mut s, 100.0, 2, 10);
        let report = s.tick(&mut engine);

        assert_eq!(report.terminals, 4);
        assert_eq!(report.edges, 3);
        assert_eq!(report.generators, 1);
        assert_eq!(report.updated, 4);
        assert_eq!(report.power_for(s.primary(g)), fixed(100.0));
        assert_approx(report.power_for(s.primary(b)), 72.9);
        assert_eq!(s.world.delivered(b), report.power_for(s.primary(b)));
    }

    #[test]
    fn stale_wires_are_removed_from_repository() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        let (_, b) = chain(&mut s, 100.0, 1, 10);
        let pole = DevicePos::new(10, 0, 0);
        s.world.place(pole, MockDevice::cabin());

        let report = s.tick(&mut engine);
        assert_eq!(report.stale_terminals, vec![s.primary(pole)]);
        assert!(s.wires.is_empty());
        assert_eq!(s.world.delivered(b), Fixed64::ZERO);

        let report = s.tick(&mut engine);
        assert!(report.stale_terminals.is_empty());
    }

    #[test]
    fn weather_only_sampled_for_generators() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        chain(&mut s, 100.0, 3, 10);
        s.tick(&mut engine);
        assert_eq!(s.weather.samples, 1);
    }

    #[test]
    fn multi_terminal_turbine_emits_one_event() {
        let mut engine = PowerEngine::new();
        let mut s = Scenario::new();
        s.weather = FixedWeather::new(17.0, 0.7);
        let g = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(100.0));
        let b1 = s.place(DevicePos::new(10, 0, 0), MockDevice::power_box());
        let b2 = s.place(DevicePos::new(-10, 0, 0), MockDevice::power_box());
        let second = s.extra_terminal(g);
        s.connect(g, b1);
        s.connect_terminals(second, s.primary(b2));

        let first = s.tick(&mut engine);
        assert_eq!(s.weather.samples, 1);
        assert_eq!(engine.synthesizer().len(), 1);
        let event = first.event_for(s.primary(g));
        assert!(event.surge_duration() >= 4);
        assert_eq!(first.event_for(second), event);

        // Both terminals count the shared event down once per tick.
        let next = s.tick(&mut engine);
        assert_eq!(s.weather.samples, 1);
        assert_eq!(next.event_for(second).surge_duration(), event.surge_duration() - 1);
        assert_eq!(next.event_for(s.primary(g)), next.event_for(second));
    }
}
