//! Power-quality events: surges, brownouts and hard disconnects.
//!
//! Events are produced at generators, attenuated hop by hop as they travel
//! down the network, and merged with a worst-case rule wherever several
//! paths converge on one terminal.

use crate::fixed::{Fixed64, clamp_unit};
use serde::{Deserialize, Serialize};

/// A transient power-quality descriptor attached to delivered power.
///
/// Immutable. Construction clamps every field into its valid range, so a
/// value of this type always satisfies `severity, brownout in [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerQualityEvent {
    surge_severity: Fixed64,
    surge_duration: u32,
    disconnect_active: bool,
    brownout_factor: Fixed64,
}

impl Default for PowerQualityEvent {
    fn default() -> Self {
        Self::none()
    }
}

impl PowerQualityEvent {
    /// Build an event, clamping severity and brownout into `[0, 1]`.
    pub fn new(
        surge_severity: Fixed64,
        surge_duration: u32,
        disconnect_active: bool,
        brownout_factor: Fixed64,
    ) -> Self {
        Self {
            surge_severity: clamp_unit(surge_severity),
            surge_duration,
            disconnect_active,
            brownout_factor: clamp_unit(brownout_factor),
        }
    }

    /// The neutral event: no surge, no disconnect, no attenuation.
    pub fn none() -> Self {
        Self {
            surge_severity: Fixed64::ZERO,
            surge_duration: 0,
            disconnect_active: false,
            brownout_factor: Fixed64::ONE,
        }
    }

    pub fn surge_severity(&self) -> Fixed64 {
        self.surge_severity
    }

    /// Remaining duration in ticks.
    pub fn surge_duration(&self) -> u32 {
        self.surge_duration
    }

    pub fn disconnect_active(&self) -> bool {
        self.disconnect_active
    }

    pub fn brownout_factor(&self) -> Fixed64 {
        self.brownout_factor
    }

    /// True if the event lasts, disconnects, or degrades supply.
    ///
    /// Severity alone does not make an event worth persisting.
    pub fn is_significant(&self) -> bool {
        self.surge_duration > 0 || self.disconnect_active || self.brownout_factor < Fixed64::ONE
    }

    /// The event as seen one hop downstream across a wire group of the
    /// given efficiency.
    ///
    /// Duration drops by one tick per hop; disconnect and brownout only
    /// survive while duration remains.
    pub fn attenuate(&self, efficiency: Fixed64, attenuation: Fixed64) -> Self {
        let efficiency = clamp_unit(efficiency);
        let duration = self.surge_duration.saturating_sub(1);
        let brownout = if duration > 0 {
            Fixed64::ONE - (Fixed64::ONE - self.brownout_factor) * efficiency
        } else {
            Fixed64::ONE
        };
        Self::new(
            self.surge_severity * efficiency * attenuation,
            duration,
            self.disconnect_active && duration > 0,
            brownout,
        )
    }

    /// Worst-case combination of two events reaching the same terminal.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            surge_severity: self.surge_severity.max(other.surge_severity),
            surge_duration: self.surge_duration.max(other.surge_duration),
            disconnect_active: self.disconnect_active || other.disconnect_active,
            brownout_factor: self.brownout_factor.min(other.brownout_factor),
        }
    }
}
