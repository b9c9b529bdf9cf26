//! Wind farm example: a host loop driving the power engine.
//!
//! Two turbines feed a line of utility poles through an electric cabin to
//! three power boxes. Wind picks up over the run until storms start
//! tripping faults, and halfway through a pole is torn down so the boxes
//! behind it drop out of the network.
//!
//! Run with: `cargo run -p gridwire-examples --example wind_farm`
//! (set `RUST_LOG=gridwire_core=debug` for per-tick engine logs).

use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

use gridwire_core::config::EngineConfig;
use gridwire_core::device::{Device, DeviceRegistry, WeatherOracle, WeatherSample};
use gridwire_core::engine::{PowerEngine, TickContext};
use gridwire_core::event::PowerQualityEvent;
use gridwire_core::fixed::{Fixed64, fixed64_to_f64};
use gridwire_core::id::{DeviceKind, DevicePos, PowerRole, TerminalId};
use gridwire_core::notify::{UpdateBuffer, UpdateCause};
use gridwire_core::wire::{WireEdge, WireEnd, WireStore};
use gridwire_data::{DataLoadError, load_engine_config_from_dir};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICKS: u64 = 40;
const TEAR_DOWN_AT: u64 = 24;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

struct FarmDevice {
    kind: DeviceKind,
    terminal: TerminalId,
    /// Wind speed the turbine last saw. Unused by other kinds.
    wind: Fixed64,
    delivered: Fixed64,
    event: PowerQualityEvent,
}

impl FarmDevice {
    fn new(kind: DeviceKind, terminal: TerminalId) -> Self {
        Self {
            kind,
            terminal,
            wind: Fixed64::ZERO,
            delivered: Fixed64::ZERO,
            event: PowerQualityEvent::none(),
        }
    }
}

impl Device for FarmDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Rated 140 at 16 m/s, zero outside the 3..25 m/s operating band.
    fn offered_output(&self) -> Fixed64 {
        if !self.kind.is_generator() {
            return Fixed64::ZERO;
        }
        let cut_in = Fixed64::from_num(3);
        let cut_off = Fixed64::from_num(25);
        if self.wind < cut_in || self.wind > cut_off {
            return Fixed64::ZERO;
        }
        let ratio = self.wind.min(Fixed64::from_num(16)) / Fixed64::from_num(16);
        Fixed64::from_num(140) * ratio * ratio
    }

    fn is_locally_surging(&self) -> bool {
        self.kind.is_generator() && self.wind > Fixed64::from_num(22)
    }
}

#[derive(Default)]
struct Farm {
    devices: BTreeMap<DevicePos, FarmDevice>,
    next_terminal: u32,
}

impl Farm {
    fn place(&mut self, pos: DevicePos, kind: DeviceKind) -> WireEnd {
        self.next_terminal += 1;
        let terminal = TerminalId(self.next_terminal);
        self.devices.insert(pos, FarmDevice::new(kind, terminal));
        WireEnd::new(terminal, pos, kind, role_of(kind))
    }

    fn set_wind(&mut self, weather: &mut GustyWeather) {
        for (pos, device) in &mut self.devices {
            if device.kind.is_generator() {
                device.wind = weather.sample(*pos).wind_speed;
            }
        }
    }
}

impl DeviceRegistry for Farm {
    fn device(&self, pos: DevicePos) -> Option<&dyn Device> {
        self.devices.get(&pos).map(|d| d as &dyn Device)
    }

    fn apply_delivered_power(&mut self, pos: DevicePos, power: Fixed64, event: PowerQualityEvent) {
        if let Some(device) = self.devices.get_mut(&pos) {
            device.delivered = power;
            device.event = event;
        }
    }
}

fn role_of(kind: DeviceKind) -> PowerRole {
    match kind {
        DeviceKind::WindTurbine => PowerRole::Output,
        DeviceKind::PowerBox => PowerRole::Input,
        DeviceKind::ElectricCabin | DeviceKind::UtilityPole => PowerRole::Bidirectional,
    }
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// Wind that ramps up over the run, with a slow oscillation on top.
struct GustyWeather {
    tick: u64,
}

impl WeatherOracle for GustyWeather {
    fn sample(&mut self, pos: DevicePos) -> WeatherSample {
        let t = self.tick as f64;
        let offset = f64::from(pos.x) / 50.0;
        let wind = 6.0 + t * 0.45 + 3.0 * (t / 3.0 + offset).sin();
        let turbulence = (0.2 + t / 60.0).min(1.0);
        WeatherSample::new(Fixed64::from_num(wind), Fixed64::from_num(turbulence))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn load_config() -> Result<EngineConfig, DataLoadError> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    match load_engine_config_from_dir(&dir) {
        Ok(config) => Ok(config),
        Err(DataLoadError::MissingRequired { .. }) => {
            warn!(dir = %dir.display(), "no engine config found, using defaults");
            Ok(EngineConfig::default())
        }
        Err(e) => Err(e),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut engine = PowerEngine::with_config(load_config()?)?;
    let mut farm = Farm::default();
    let mut wires = WireStore::new();

    // --- Layout ---

    let west = farm.place(DevicePos::new(-40, 0, 0), DeviceKind::WindTurbine);
    let east = farm.place(DevicePos::new(-40, 0, 30), DeviceKind::WindTurbine);
    let cabin = farm.place(DevicePos::new(0, 0, 15), DeviceKind::ElectricCabin);
    wires.insert(WireEdge::new(west, cabin));
    wires.insert(WireEdge::new(east, cabin));

    let mut prev = cabin;
    let mut poles = Vec::new();
    for i in 1..=4 {
        let pole = farm.place(DevicePos::new(i * 25, 0, 15), DeviceKind::UtilityPole);
        wires.insert(WireEdge::new(prev, pole));
        poles.push(pole);
        prev = pole;
    }

    let mut boxes = Vec::new();
    for (i, z) in [5, 15, 25].into_iter().enumerate() {
        let sink = farm.place(DevicePos::new(120, 0, z), DeviceKind::PowerBox);
        // The first box hangs off the second pole, the rest off the last.
        let feeder = if i == 0 { poles[1] } else { prev };
        wires.insert(WireEdge::new(feeder, sink));
        boxes.push(sink);
    }

    let mut weather = GustyWeather { tick: 0 };
    let mut updates = UpdateBuffer::new(256);

    println!("=== Wind farm: 2 turbines, 1 cabin, 4 poles, 3 boxes ===\n");

    for tick in 0..TICKS {
        weather.tick = tick;
        farm.set_wind(&mut weather);

        if tick == TEAR_DOWN_AT {
            let torn = poles[2].pos;
            farm.devices.remove(&torn);
            info!(x = torn.x, z = torn.z, "pole torn down");
        }

        let report = engine.tick(&mut TickContext {
            devices: &mut farm,
            edges: &mut wires,
            weather: &mut weather,
            broadcaster: &mut updates,
        });

        let offered: f64 = [west, east]
            .iter()
            .filter_map(|t| farm.devices.get(&t.pos))
            .map(|d| fixed64_to_f64(d.offered_output()))
            .sum();
        let delivered: Vec<String> = boxes
            .iter()
            .map(|b| {
                let device = farm.devices.get(&b.pos);
                let power = device.map_or(0.0, |d| fixed64_to_f64(d.delivered));
                let flag = match device.map(|d| d.event) {
                    Some(e) if e.disconnect_active() => "!",
                    Some(e) if e.is_significant() => "~",
                    _ => "",
                };
                format!("{power:6.2}{flag:1}")
            })
            .collect();
        println!(
            "tick {:>2}: offered {:6.2}  boxes [{}]  surge-hit {}{}",
            report.tick,
            offered,
            delivered.join(" "),
            report.surge_impacted.len(),
            if report.is_truncated() { "  (truncated)" } else { "" },
        );

        for update in updates.drain() {
            if update.cause == UpdateCause::Disconnected {
                println!(
                    "         device at ({}, {}) left the network",
                    update.pos.x, update.pos.z
                );
            }
        }
        if !report.stale_terminals.is_empty() {
            println!(
                "         removed wires of {} stale terminal(s), {} wires left",
                report.stale_terminals.len(),
                wires.len()
            );
        }
    }

    let snapshot = engine.save_state()?;
    println!(
        "\nSaved engine state after tick {}: {} bytes, {} persisted event(s)",
        engine.current_tick(),
        snapshot.len(),
        engine.synthesizer().len()
    );

    Ok(())
}
