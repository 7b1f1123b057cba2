//! Common types and traits shared by the river-network node models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable zero-based node identifier, also the arena index.
pub type NodeId = usize;

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.80665;

/// Seconds per hour, used for energy and hourly penalty conversions.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Converts a flow in m³/s over `dt_s` seconds into a volume in Mm³.
pub fn m3s_to_mm3(flow_m3s: f64, dt_s: f64) -> f64 {
    flow_m3s * dt_s / 1e6
}

/// Converts a volume in Mm³ released over `dt_s` seconds into a flow in m³/s.
pub fn mm3_to_m3s(volume_mm3: f64, dt_s: f64) -> f64 {
    volume_mm3 * 1e6 / dt_s
}

/// The three roles a node can play in a river system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Reservoir,
    PowerStation,
    Junction,
}

impl NodeKind {
    /// Whether callers may set a dispatch action on this kind of node.
    pub fn is_dispatchable(self) -> bool {
        matches!(self, NodeKind::Reservoir | NodeKind::PowerStation)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Reservoir => "reservoir",
            NodeKind::PowerStation => "power station",
            NodeKind::Junction => "junction",
        };
        f.write_str(name)
    }
}

/// Trait implemented by every node model for water accounting.
///
/// The engine uses it to close the water balance and to value water
/// left in the system once the horizon ends.
pub trait HydroNode {
    /// Node identifier.
    fn id(&self) -> NodeId;

    /// Human-readable node name.
    fn name(&self) -> &str;

    /// Node role.
    fn kind(&self) -> NodeKind;

    /// Water currently held by the node (Mm³).
    fn storage_mm3(&self) -> f64;

    /// Water the node could still release downstream (Mm³).
    fn remaining_mm3(&self) -> f64;
}
