//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::BTreeMap;

use crate::device::{Device, DeviceRegistry, WeatherOracle, WeatherSample};
use crate::engine::{PowerEngine, TickContext, TickReport};
use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, Ticks, fixed64_to_f64};
use crate::graph::{BuildOutcome, TickGraph};
use crate::id::{DeviceKind, DevicePos, PowerRole, TerminalId};
use crate::notify::{Broadcaster, PowerUpdate};
use crate::wire::{EdgeRepository, WireEdge, WireEnd, WireStore};

// ===========================================================================
// Fixed-point helpers
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Assert a fixed-point value is within 1e-6 of `expected`.
#[track_caller]
pub fn assert_approx(actual: Fixed64, expected: f64) {
    let actual = fixed64_to_f64(actual);
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ===========================================================================
// Devices
// ===========================================================================

/// A scriptable device that records what the engine applied to it.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub kind: DeviceKind,
    pub output: Fixed64,
    pub surging: bool,
    pub delivered: Fixed64,
    pub event: PowerQualityEvent,
    pub applied: u32,
}

impl MockDevice {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            output: Fixed64::ZERO,
            surging: false,
            delivered: Fixed64::ZERO,
            event: PowerQualityEvent::none(),
            applied: 0,
        }
    }

    pub fn turbine(output: f64) -> Self {
        Self {
            output: fixed(output),
            ..Self::new(DeviceKind::WindTurbine)
        }
    }

    pub fn pole() -> Self {
        Self::new(DeviceKind::UtilityPole)
    }

    pub fn cabin() -> Self {
        Self::new(DeviceKind::ElectricCabin)
    }

    pub fn power_box() -> Self {
        Self::new(DeviceKind::PowerBox)
    }

    pub fn surging(mut self) -> Self {
        self.surging = true;
        self
    }
}

impl Device for MockDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn offered_output(&self) -> Fixed64 {
        if self.kind.is_generator() {
            self.output
        } else {
            Fixed64::ZERO
        }
    }

    fn is_locally_surging(&self) -> bool {
        self.surging
    }
}

/// Devices by position.
#[derive(Debug, Clone, Default)]
pub struct MockWorld {
    devices: BTreeMap<DevicePos, MockDevice>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a device, replacing whatever was at `pos`.
    pub fn place(&mut self, pos: DevicePos, device: MockDevice) {
        self.devices.insert(pos, device);
    }

    pub fn remove(&mut self, pos: DevicePos) -> Option<MockDevice> {
        self.devices.remove(&pos)
    }

    pub fn get(&self, pos: DevicePos) -> Option<&MockDevice> {
        self.devices.get(&pos)
    }

    pub fn get_mut(&mut self, pos: DevicePos) -> Option<&mut MockDevice> {
        self.devices.get_mut(&pos)
    }

    /// Last power applied to the device at `pos`, zero if none.
    pub fn delivered(&self, pos: DevicePos) -> Fixed64 {
        self.get(pos).map_or(Fixed64::ZERO, |d| d.delivered)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceRegistry for MockWorld {
    fn device(&self, pos: DevicePos) -> Option<&dyn Device> {
        self.devices.get(&pos).map(|d| d as &dyn Device)
    }

    fn apply_delivered_power(&mut self, pos: DevicePos, power: Fixed64, event: PowerQualityEvent) {
        if let Some(device) = self.devices.get_mut(&pos) {
            device.delivered = power;
            device.event = event;
            device.applied += 1;
        }
    }
}

// ===========================================================================
// Weather
// ===========================================================================

/// Weather that is constant unless overridden per position.
#[derive(Debug, Clone)]
pub struct FixedWeather {
    pub default: WeatherSample,
    pub overrides: BTreeMap<DevicePos, WeatherSample>,
    /// Number of samples taken.
    pub samples: u32,
}

impl FixedWeather {
    pub fn new(wind_speed: f64, turbulence: f64) -> Self {
        Self {
            default: WeatherSample::new(fixed(wind_speed), fixed(turbulence)),
            overrides: BTreeMap::new(),
            samples: 0,
        }
    }

    pub fn calm() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Wind and turbulence high enough to make faults likely.
    pub fn stormy() -> Self {
        Self::new(30.0, 1.0)
    }

    pub fn set(&mut self, pos: DevicePos, sample: WeatherSample) {
        self.overrides.insert(pos, sample);
    }
}

impl WeatherOracle for FixedWeather {
    fn sample(&mut self, pos: DevicePos) -> WeatherSample {
        self.samples += 1;
        self.overrides.get(&pos).copied().unwrap_or(self.default)
    }
}

// ===========================================================================
// Broadcast
// ===========================================================================

/// Broadcaster that keeps every update.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub updates: Vec<PowerUpdate>,
}

impl Recorder {
    pub fn for_tick(&self, tick: Ticks) -> Vec<PowerUpdate> {
        self.updates
            .iter()
            .filter(|u| u.tick == tick)
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.updates.clear();
    }
}

impl Broadcaster for Recorder {
    fn notify(&mut self, update: &PowerUpdate) {
        self.updates.push(*update);
    }
}

// ===========================================================================
// Wire-building scenario
// ===========================================================================

/// The role a terminal of this kind normally plays.
pub fn default_role(kind: DeviceKind) -> PowerRole {
    match kind {
        DeviceKind::WindTurbine => PowerRole::Output,
        DeviceKind::PowerBox => PowerRole::Input,
        DeviceKind::UtilityPole | DeviceKind::ElectricCabin => PowerRole::Bidirectional,
    }
}

/// A world, its wires and its weather, with terminal id allocation.
///
/// Every placed device gets one primary terminal; more can be allocated
/// with [`Scenario::extra_terminal`].
#[derive(Debug, Clone)]
pub struct Scenario {
    pub world: MockWorld,
    pub wires: WireStore,
    pub weather: FixedWeather,
    pub recorder: Recorder,
    primaries: BTreeMap<DevicePos, TerminalId>,
    terminals: BTreeMap<TerminalId, DevicePos>,
    next_terminal: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    pub fn new() -> Self {
        Self {
            world: MockWorld::new(),
            wires: WireStore::new(),
            weather: FixedWeather::calm(),
            recorder: Recorder::default(),
            primaries: BTreeMap::new(),
            terminals: BTreeMap::new(),
            next_terminal: 1,
        }
    }

    fn allocate(&mut self, pos: DevicePos) -> TerminalId {
        let id = TerminalId(self.next_terminal);
        self.next_terminal += 1;
        self.terminals.insert(id, pos);
        id
    }

    /// Place a device and return its position. Re-placing keeps the
    /// primary terminal.
    pub fn place(&mut self, pos: DevicePos, device: MockDevice) -> DevicePos {
        self.world.place(pos, device);
        if !self.primaries.contains_key(&pos) {
            let id = self.allocate(pos);
            self.primaries.insert(pos, id);
        }
        pos
    }

    /// The primary terminal of the device placed at `pos`.
    ///
    /// Panics if nothing was placed there.
    pub fn primary(&self, pos: DevicePos) -> TerminalId {
        self.primaries[&pos]
    }

    pub fn extra_terminal(&mut self, pos: DevicePos) -> TerminalId {
        self.allocate(pos)
    }

    fn end(&self, terminal: TerminalId, role: Option<PowerRole>) -> WireEnd {
        let pos = self.terminals[&terminal];
        let kind = self
            .world
            .get(pos)
            .map(|d| d.kind)
            .unwrap_or(DeviceKind::UtilityPole);
        WireEnd::new(terminal, pos, kind, role.unwrap_or(default_role(kind)))
    }

    /// Wire two devices' primary terminals with their default roles.
    pub fn connect(&mut self, a: DevicePos, b: DevicePos) -> (TerminalId, TerminalId) {
        let (ta, tb) = (self.primary(a), self.primary(b));
        self.connect_terminals(ta, tb);
        (ta, tb)
    }

    pub fn connect_terminals(&mut self, a: TerminalId, b: TerminalId) {
        let edge = WireEdge::new(self.end(a, None), self.end(b, None));
        self.wires.insert(edge);
    }

    pub fn connect_roles(&mut self, a: TerminalId, a_role: PowerRole, b: TerminalId, b_role: PowerRole) {
        let edge = WireEdge::new(self.end(a, Some(a_role)), self.end(b, Some(b_role)));
        self.wires.insert(edge);
    }

    /// Build a graph from the current wires without ticking an engine.
    pub fn build(&self) -> BuildOutcome {
        TickGraph::build(&self.wires.all_edges(), &self.world)
    }

    pub fn tick(&mut self, engine: &mut PowerEngine) -> TickReport {
        let mut ctx = TickContext {
            devices: &mut self.world,
            edges: &mut self.wires,
            weather: &mut self.weather,
            broadcaster: &mut self.recorder,
        };
        engine.tick(&mut ctx)
    }
}

// ===========================================================================
// Layouts
// ===========================================================================

/// A turbine feeding a chain of `poles` poles ending in a power box, each
/// hop `spacing` apart along x. Returns `(turbine, box)` positions.
pub fn chain(s: &mut Scenario, output: f64, poles: u32, spacing: i32) -> (DevicePos, DevicePos) {
    let turbine = s.place(DevicePos::new(0, 0, 0), MockDevice::turbine(output));
    let mut prev = turbine;
    for i in 1..=poles as i32 {
        let pole = s.place(DevicePos::new(i * spacing, 0, 0), MockDevice::pole());
        s.connect(prev, pole);
        prev = pole;
    }
    let sink = s.place(
        DevicePos::new((poles as i32 + 1) * spacing, 0, 0),
        MockDevice::power_box(),
    );
    s.connect(prev, sink);
    (turbine, sink)
}

/// A `side` x `side` grid of poles, each wired to its right and lower
/// neighbours, fed by one turbine at a corner.
pub fn mesh(s: &mut Scenario, output: f64, side: i32, spacing: i32) -> DevicePos {
    let turbine = s.place(DevicePos::new(-spacing, 0, 0), MockDevice::turbine(output));
    for x in 0..side {
        for z in 0..side {
            s.place(DevicePos::new(x * spacing, 0, z * spacing), MockDevice::pole());
        }
    }
    s.connect(turbine, DevicePos::new(0, 0, 0));
    for x in 0..side {
        for z in 0..side {
            let here = DevicePos::new(x * spacing, 0, z * spacing);
            if x + 1 < side {
                s.connect(here, DevicePos::new((x + 1) * spacing, 0, z * spacing));
            }
            if z + 1 < side {
                s.connect(here, DevicePos::new(x * spacing, 0, (z + 1) * spacing));
            }
        }
    }
    turbine
}
