//! Generator event synthesis.
//!
//! Events belong to generator devices, keyed by position, so a turbine
//! wired through several terminals still emits one event per tick. A
//! generator keeps its event for as long as the event lasts, counting
//! one tick down per tick. Once it has run out, a fresh event is derived
//! from a weather sample at the generator: gusts and turbulence raise surge
//! severity, and extreme conditions may trip a hard fault that disconnects
//! and browns out everything downstream.

use std::collections::BTreeMap;

use crate::config::SynthConfig;
use crate::device::{WeatherOracle, WeatherSample};
use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, checked_div_64, clamp_unit};
use crate::id::DevicePos;
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};

/// Persisted per-generator events plus the RNG that drives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSynthesizer {
    events: BTreeMap<DevicePos, PowerQualityEvent>,
    rng: SimRng,
}

impl EventSynthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            events: BTreeMap::new(),
            rng: SimRng::new(seed),
        }
    }

    /// The event the generator at `pos` emits this tick.
    ///
    /// Weather is only sampled when no persisted event is still running.
    /// Call at most once per generator per tick; each call advances the
    /// running event.
    pub fn event_for(
        &mut self,
        pos: DevicePos,
        weather: &mut dyn WeatherOracle,
        config: &SynthConfig,
    ) -> PowerQualityEvent {
        if let Some(running) = self.events.get_mut(&pos) {
            if running.surge_duration() > 0 {
                *running = PowerQualityEvent::new(
                    running.surge_severity(),
                    running.surge_duration() - 1,
                    running.disconnect_active(),
                    running.brownout_factor(),
                );
                return *running;
            }
        }

        let event = self.synthesize(weather.sample(pos), config);
        if event.is_significant() {
            self.events.insert(pos, event);
        } else {
            self.events.remove(&pos);
        }
        event
    }

    /// Derive a fresh event from one weather sample.
    ///
    /// Arithmetic saturates, so extreme weather or tuning pins values at
    /// their bounds instead of overflowing.
    pub fn synthesize(&mut self, sample: WeatherSample, config: &SynthConfig) -> PowerQualityEvent {
        let wind = sample.wind_speed;
        let turbulence = sample.turbulence;

        let gust = clamp_unit(ratio(wind.saturating_sub(config.gust_floor), config.gust_span));
        let base = turbulence
            .saturating_sub(config.turbulence_floor)
            .saturating_mul(config.turbulence_weight)
            .saturating_add(gust.saturating_mul(config.gust_weight))
            .max(Fixed64::ZERO);
        let jitter = self.rng.next_fixed().saturating_mul(config.jitter);
        let severity = base.saturating_add(jitter).max(Fixed64::ZERO);

        let mut duration = if severity > config.severity_threshold {
            config
                .min_duration
                .saturating_add(self.rng.next_below(config.duration_spread))
        } else {
            0
        };

        let mut disconnect = false;
        let mut brownout = Fixed64::ONE;
        if wind > config.fault_wind || turbulence > config.fault_turbulence {
            let fault = wind
                .saturating_sub(config.fault_wind)
                .saturating_mul(config.fault_wind_rate)
                .saturating_add(
                    turbulence
                        .saturating_sub(config.fault_turbulence)
                        .saturating_mul(config.fault_turbulence_rate),
                )
                .clamp(Fixed64::ZERO, config.max_fault_chance);
            if self.rng.chance(fault) {
                disconnect = true;
                duration = duration.max(
                    config
                        .disconnect_min_duration
                        .saturating_add(self.rng.next_below(config.disconnect_spread)),
                );
                brownout = config
                    .brownout_base
                    .saturating_add(self.rng.next_fixed().saturating_mul(config.brownout_spread));
            }
        }

        PowerQualityEvent::new(severity, duration, disconnect, brownout)
    }

    /// Drop persisted events of generators for which `keep` is false.
    pub fn prune(&mut self, mut keep: impl FnMut(DevicePos) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|&pos, _| keep(pos));
        before - self.events.len()
    }

    pub fn persisted(&self, pos: DevicePos) -> Option<PowerQualityEvent> {
        self.events.get(&pos).copied()
    }

    /// Number of generators with a persisted event.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn rng(&self) -> &SimRng {
        &self.rng
    }
}

/// `num / den`, saturating toward the sign of the true quotient.
fn ratio(num: Fixed64, den: Fixed64) -> Fixed64 {
    checked_div_64(num, den).unwrap_or(if (num < Fixed64::ZERO) == (den < Fixed64::ZERO) {
        Fixed64::MAX
    } else {
        Fixed64::MIN
    })
}
