//! Interfaces to the world the engine runs in: live devices and weather.
//!
//! The engine never owns devices. It reads a device's kind, offered output
//! and surge flag while building the tick graph, and writes delivered power
//! back through the registry once the tick has been computed.

use crate::event::PowerQualityEvent;
use crate::fixed::Fixed64;
use crate::id::{DeviceKind, DevicePos};

/// A live device as seen by the power engine.
pub trait Device {
    /// The device's kind, checked against the kind recorded on each wire.
    fn kind(&self) -> DeviceKind;

    /// Power this device injects this tick. Zero for non-generators.
    fn offered_output(&self) -> Fixed64 {
        Fixed64::ZERO
    }

    /// Whether the device currently reports a local surge.
    fn is_locally_surging(&self) -> bool {
        false
    }
}

/// Lookup and write access to devices by world position.
pub trait DeviceRegistry {
    /// The device currently at `pos`, if any.
    fn device(&self, pos: DevicePos) -> Option<&dyn Device>;

    /// Hand the aggregated result of a tick to the device at `pos`.
    /// Positions without a device are ignored.
    fn apply_delivered_power(&mut self, pos: DevicePos, power: Fixed64, event: PowerQualityEvent);
}

/// Weather conditions at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherSample {
    /// Sustained wind speed.
    pub wind_speed: Fixed64,
    /// Turbulence in `[0, 1]`.
    pub turbulence: Fixed64,
}

impl WeatherSample {
    pub fn new(wind_speed: Fixed64, turbulence: Fixed64) -> Self {
        Self {
            wind_speed,
            turbulence,
        }
    }

    pub fn calm() -> Self {
        Self::new(Fixed64::ZERO, Fixed64::ZERO)
    }
}

/// Source of weather samples used to synthesize generator events.
pub trait WeatherOracle {
    fn sample(&mut self, pos: DevicePos) -> WeatherSample;
}
