use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a terminal node in a tick-local graph.
    pub struct NodeKey;

    /// Identifies a wire edge in a tick-local graph.
    pub struct EdgeKey;

    /// Identifies a cluster (all terminals on one device) in a tick-local graph.
    pub struct ClusterKey;
}

/// Identifies a terminal (a named connection point on a device).
///
/// Stable across ticks. The value `0` is the unassigned id: wire records
/// carrying it are never reported for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerminalId(pub u32);

impl TerminalId {
    pub const UNASSIGNED: TerminalId = TerminalId(0);

    pub fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

/// World position of a device. Terminals on the same position form a cluster.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DevicePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl DevicePos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Squared straight-line distance, exact in integer arithmetic.
    pub fn distance_squared(self, other: DevicePos) -> i128 {
        let dx = i128::from(self.x) - i128::from(other.x);
        let dy = i128::from(self.y) - i128::from(other.y);
        let dz = i128::from(self.z) - i128::from(other.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Straight-line distance. Floating point; used only when a wire is created.
    pub fn distance(self, other: DevicePos) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }
}

/// The kind of device a terminal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Generator: offers output power each tick.
    WindTurbine,
    /// Relay.
    ElectricCabin,
    /// Relay.
    UtilityPole,
    /// Consumer.
    PowerBox,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 4] = [
        DeviceKind::WindTurbine,
        DeviceKind::ElectricCabin,
        DeviceKind::UtilityPole,
        DeviceKind::PowerBox,
    ];

    /// Whether devices of this kind inject power into the network.
    pub fn is_generator(self) -> bool {
        matches!(self, DeviceKind::WindTurbine)
    }

    /// The snake_case name used in data files and logs.
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::WindTurbine => "wind_turbine",
            DeviceKind::ElectricCabin => "electric_cabin",
            DeviceKind::UtilityPole => "utility_pole",
            DeviceKind::PowerBox => "power_box",
        }
    }
}

/// The declared power direction of one wire endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerRole {
    Output,
    Input,
    Bidirectional,
}

impl PowerRole {
    /// Whether power may flow from an endpoint with role `self` to one with
    /// role `to`. `same_device` enables the input-to-output hop between two
    /// terminals of one device.
    pub fn feeds(self, to: PowerRole, same_device: bool) -> bool {
        match (self, to) {
            (PowerRole::Output | PowerRole::Bidirectional, PowerRole::Input)
            | (PowerRole::Output | PowerRole::Bidirectional, PowerRole::Bidirectional) => true,
            (PowerRole::Input, PowerRole::Output) => same_device,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_zero_is_unassigned() {
        assert!(!TerminalId::UNASSIGNED.is_assigned());
        assert!(TerminalId(1).is_assigned());
    }

    #[test]
    fn distance_is_euclidean() {
        let a = DevicePos::new(0, 0, 0);
        let b = DevicePos::new(3, 4, 0);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn positions_are_ordered() {
        let mut v = vec![DevicePos::new(2, 0, 0), DevicePos::new(1, 5, 0)];
        v.sort();
        assert_eq!(v[0], DevicePos::new(1, 5, 0));
    }

    #[test]
    fn only_turbines_generate() {
        let generators: Vec<_> = DeviceKind::ALL
            .iter()
            .filter(|k| k.is_generator())
            .collect();
        assert_eq!(generators, vec![&DeviceKind::WindTurbine]);
    }

    #[test]
    fn role_pairings() {
        use PowerRole::*;
        assert!(Output.feeds(Input, false));
        assert!(Output.feeds(Bidirectional, false));
        assert!(Bidirectional.feeds(Input, false));
        assert!(Bidirectional.feeds(Bidirectional, false));
        assert!(!Output.feeds(Output, false));
        assert!(!Input.feeds(Input, true));
        assert!(!Input.feeds(Bidirectional, false));
        assert!(!Input.feeds(Output, false));
        assert!(Input.feeds(Output, true));
    }
}
