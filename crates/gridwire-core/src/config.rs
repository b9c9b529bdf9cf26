//! Engine tuning: efficiency model, event attenuation and event synthesis.
//!
//! Defaults reproduce the gameplay constants the distribution model was
//! balanced against. Every field can be overridden from a data file (see
//! the `gridwire-data` crate); [`EngineConfig::validate`] rejects values that
//! would break the engine's invariants.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A configuration value outside its valid range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: Fixed64 },
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: Fixed64 },
    #[error("{field} must lie in [0, 1], got {value}")]
    NotUnit { field: &'static str, value: Fixed64 },
    #[error("min_efficiency must lie in (0, 1], got {0}")]
    EfficiencyFloor(Fixed64),
    #[error("expansion_budget must be at least 1")]
    ZeroBudget,
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Parameters of the per-hop efficiency and event attenuation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Wire length that costs 100% efficiency before the parallel boost.
    pub distance_scale: Fixed64,
    /// Extra divisor per additional parallel wire to the same device.
    pub parallel_boost: Fixed64,
    /// Efficiency never drops below this from distance alone.
    pub min_efficiency: Fixed64,
    /// Severity multiplier applied per hop on top of efficiency.
    pub event_attenuation: Fixed64,
    /// Cap on frames expanded per generator per tick. `None` is unbounded.
    pub expansion_budget: Option<u32>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            distance_scale: Fixed64::from_num(100),
            parallel_boost: Fixed64::from_num(0.35),
            min_efficiency: Fixed64::from_num(0.1),
            event_attenuation: Fixed64::from_num(0.95),
            expansion_budget: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Parameters of generator event synthesis from weather samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Wind speed at which gusts start contributing to severity.
    pub gust_floor: Fixed64,
    /// Wind speed range over which the gust factor ramps from 0 to 1.
    pub gust_span: Fixed64,
    pub turbulence_floor: Fixed64,
    pub turbulence_weight: Fixed64,
    pub gust_weight: Fixed64,
    /// Upper bound of the uniform jitter added to severity.
    pub jitter: Fixed64,
    /// Severity above which an event lasts several ticks.
    pub severity_threshold: Fixed64,
    pub min_duration: u32,
    /// Number of distinct extra ticks a surge may last (uniform `0..spread`).
    pub duration_spread: u32,
    /// Wind speed above which hard faults become possible.
    pub fault_wind: Fixed64,
    /// Turbulence above which hard faults become possible.
    pub fault_turbulence: Fixed64,
    pub fault_wind_rate: Fixed64,
    pub fault_turbulence_rate: Fixed64,
    pub max_fault_chance: Fixed64,
    pub disconnect_min_duration: u32,
    pub disconnect_spread: u32,
    pub brownout_base: Fixed64,
    pub brownout_spread: Fixed64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            gust_floor: Fixed64::from_num(8),
            gust_span: Fixed64::from_num(12),
            turbulence_floor: Fixed64::from_num(0.25),
            turbulence_weight: Fixed64::from_num(0.6),
            gust_weight: Fixed64::from_num(0.4),
            jitter: Fixed64::from_num(0.05),
            severity_threshold: Fixed64::from_num(0.25),
            min_duration: 4,
            duration_spread: 5,
            fault_wind: Fixed64::from_num(18),
            fault_turbulence: Fixed64::from_num(0.75),
            fault_wind_rate: Fixed64::from_num(0.04),
            fault_turbulence_rate: Fixed64::from_num(0.25),
            max_fault_chance: Fixed64::from_num(0.5),
            disconnect_min_duration: 6,
            disconnect_spread: 5,
            brownout_base: Fixed64::from_num(0.4),
            brownout_spread: Fixed64::from_num(0.2),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the event synthesizer's RNG.
    pub seed: u64,
    pub flow: FlowConfig,
    pub synth: SynthConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x6772_6964_7769_7265,
            flow: FlowConfig::default(),
            synth: SynthConfig::default(),
        }
    }
}

fn positive(field: &'static str, value: Fixed64) -> Result<(), ConfigError> {
    if value > Fixed64::ZERO {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: Fixed64) -> Result<(), ConfigError> {
    if value >= Fixed64::ZERO {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

fn unit(field: &'static str, value: Fixed64) -> Result<(), ConfigError> {
    if (Fixed64::ZERO..=Fixed64::ONE).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::NotUnit { field, value })
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("flow.distance_scale", self.distance_scale)?;
        non_negative("flow.parallel_boost", self.parallel_boost)?;
        if self.min_efficiency <= Fixed64::ZERO || self.min_efficiency > Fixed64::ONE {
            return Err(ConfigError::EfficiencyFloor(self.min_efficiency));
        }
        unit("flow.event_attenuation", self.event_attenuation)?;
        if self.expansion_budget == Some(0) {
            return Err(ConfigError::ZeroBudget);
        }
        Ok(())
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("synth.gust_span", self.gust_span)?;
        non_negative("synth.turbulence_weight", self.turbulence_weight)?;
        non_negative("synth.gust_weight", self.gust_weight)?;
        non_negative("synth.jitter", self.jitter)?;
        non_negative("synth.fault_wind_rate", self.fault_wind_rate)?;
        non_negative("synth.fault_turbulence_rate", self.fault_turbulence_rate)?;
        unit("synth.max_fault_chance", self.max_fault_chance)?;
        unit("synth.brownout_base", self.brownout_base)?;
        non_negative("synth.brownout_spread", self.brownout_spread)?;
        unit(
            "synth.brownout_base + brownout_spread",
            self.brownout_base.saturating_add(self.brownout_spread),
        )?;
        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.flow.validate()?;
        self.synth.validate()
    }
}
