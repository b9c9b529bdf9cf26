//! Serde types mirroring the on-disk engine configuration.
//!
//! The file schema uses `f64` so data files can be written with ordinary
//! decimals. Conversion to the engine's fixed-point configuration happens
//! once, in [`EngineData::to_config`].

use gridwire_core::config::{EngineConfig, FlowConfig, SynthConfig};
use gridwire_core::fixed::{Fixed64, fixed64_to_f64};
use serde::{Deserialize, Serialize};

use crate::loader::DataLoadError;

// ===========================================================================
// Schema types
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowData {
    pub distance_scale: f64,
    pub parallel_boost: f64,
    pub min_efficiency: f64,
    pub event_attenuation: f64,
    pub expansion_budget: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthData {
    pub gust_floor: f64,
    pub gust_span: f64,
    pub turbulence_floor: f64,
    pub turbulence_weight: f64,
    pub gust_weight: f64,
    pub jitter: f64,
    pub severity_threshold: f64,
    pub min_duration: u32,
    pub duration_spread: u32,
    pub fault_wind: f64,
    pub fault_turbulence: f64,
    pub fault_wind_rate: f64,
    pub fault_turbulence_rate: f64,
    pub max_fault_chance: f64,
    pub disconnect_min_duration: u32,
    pub disconnect_spread: u32,
    pub brownout_base: f64,
    pub brownout_spread: f64,
}

/// Top-level contents of an `engine.*` data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineData {
    pub seed: u64,
    pub flow: FlowData,
    pub synth: SynthData,
}

// ===========================================================================
// Defaults (taken from the engine's own defaults)
// ===========================================================================

impl From<&FlowConfig> for FlowData {
    fn from(c: &FlowConfig) -> Self {
        Self {
            distance_scale: fixed64_to_f64(c.distance_scale),
            parallel_boost: fixed64_to_f64(c.parallel_boost),
            min_efficiency: fixed64_to_f64(c.min_efficiency),
            event_attenuation: fixed64_to_f64(c.event_attenuation),
            expansion_budget: c.expansion_budget,
        }
    }
}

impl From<&SynthConfig> for SynthData {
    fn from(c: &SynthConfig) -> Self {
        Self {
            gust_floor: fixed64_to_f64(c.gust_floor),
            gust_span: fixed64_to_f64(c.gust_span),
            turbulence_floor: fixed64_to_f64(c.turbulence_floor),
            turbulence_weight: fixed64_to_f64(c.turbulence_weight),
            gust_weight: fixed64_to_f64(c.gust_weight),
            jitter: fixed64_to_f64(c.jitter),
            severity_threshold: fixed64_to_f64(c.severity_threshold),
            min_duration: c.min_duration,
            duration_spread: c.duration_spread,
            fault_wind: fixed64_to_f64(c.fault_wind),
            fault_turbulence: fixed64_to_f64(c.fault_turbulence),
            fault_wind_rate: fixed64_to_f64(c.fault_wind_rate),
            fault_turbulence_rate: fixed64_to_f64(c.fault_turbulence_rate),
            max_fault_chance: fixed64_to_f64(c.max_fault_chance),
            disconnect_min_duration: c.disconnect_min_duration,
            disconnect_spread: c.disconnect_spread,
            brownout_base: fixed64_to_f64(c.brownout_base),
            brownout_spread: fixed64_to_f64(c.brownout_spread),
        }
    }
}

impl From<&EngineConfig> for EngineData {
    fn from(c: &EngineConfig) -> Self {
        Self {
            seed: c.seed,
            flow: FlowData::from(&c.flow),
            synth: SynthData::from(&c.synth),
        }
    }
}

impl Default for FlowData {
    fn default() -> Self {
        Self::from(&FlowConfig::default())
    }
}

impl Default for SynthData {
    fn default() -> Self {
        Self::from(&SynthConfig::default())
    }
}

impl Default for EngineData {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

// ===========================================================================
// Conversion
// ===========================================================================

fn to_fixed(field: &'static str, value: f64) -> Result<Fixed64, DataLoadError> {
    Fixed64::checked_from_num(value).ok_or(DataLoadError::OutOfRange { field, value })
}

impl FlowData {
    fn to_config(&self) -> Result<FlowConfig, DataLoadError> {
        Ok(FlowConfig {
            distance_scale: to_fixed("flow.distance_scale", self.distance_scale)?,
            parallel_boost: to_fixed("flow.parallel_boost", self.parallel_boost)?,
            min_efficiency: to_fixed("flow.min_efficiency", self.min_efficiency)?,
            event_attenuation: to_fixed("flow.event_attenuation", self.event_attenuation)?,
            expansion_budget: self.expansion_budget,
        })
    }
}

impl SynthData {
    fn to_config(&self) -> Result<SynthConfig, DataLoadError> {
        Ok(SynthConfig {
            gust_floor: to_fixed("synth.gust_floor", self.gust_floor)?,
            gust_span: to_fixed("synth.gust_span", self.gust_span)?,
            turbulence_floor: to_fixed("synth.turbulence_floor", self.turbulence_floor)?,
            turbulence_weight: to_fixed("synth.turbulence_weight", self.turbulence_weight)?,
            gust_weight: to_fixed("synth.gust_weight", self.gust_weight)?,
            jitter: to_fixed("synth.jitter", self.jitter)?,
            severity_threshold: to_fixed("synth.severity_threshold", self.severity_threshold)?,
            min_duration: self.min_duration,
            duration_spread: self.duration_spread,
            fault_wind: to_fixed("synth.fault_wind", self.fault_wind)?,
            fault_turbulence: to_fixed("synth.fault_turbulence", self.fault_turbulence)?,
            fault_wind_rate: to_fixed("synth.fault_wind_rate", self.fault_wind_rate)?,
            fault_turbulence_rate: to_fixed(
                "synth.fault_turbulence_rate",
                self.fault_turbulence_rate,
            )?,
            max_fault_chance: to_fixed("synth.max_fault_chance", self.max_fault_chance)?,
            disconnect_min_duration: self.disconnect_min_duration,
            disconnect_spread: self.disconnect_spread,
            brownout_base: to_fixed("synth.brownout_base", self.brownout_base)?,
            brownout_spread: to_fixed("synth.brownout_spread", self.brownout_spread)?,
        })
    }
}

impl EngineData {
    /// Convert to fixed point and validate.
    pub fn to_config(&self) -> Result<EngineConfig, DataLoadError> {
        let config = EngineConfig {
            seed: self.seed,
            flow: self.flow.to_config()?,
            synth: self.synth.to_config()?,
        };
        config.validate()?;
        Ok(config)
    }
}
