//! River network node models: reservoirs, power stations, and junctions.

/// Piecewise-linear lookup tables.
pub mod curve;
/// Routing and confluence nodes.
pub mod junction;
/// Hydro power station model.
pub mod power_station;
/// Storage reservoir model.
pub mod reservoir;
/// Seasonal minimum-flow schedules.
pub mod season;
pub mod types;

pub use junction::Junction;
pub use power_station::PowerStation;
pub use reservoir::Reservoir;
pub use types::{HydroNode, NodeId, NodeKind};

use crate::config::NodeConfig;

/// A node of any kind, stored by value in the topology arena.
#[derive(Debug, Clone)]
pub enum Node {
    Reservoir(Reservoir),
    PowerStation(PowerStation),
    Junction(Junction),
}

impl Node {
    /// Builds a node model from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn from_config(cfg: &NodeConfig) -> Result<Self, String> {
        match cfg {
            NodeConfig::Reservoir(c) => Reservoir::from_config(c).map(Node::Reservoir),
            NodeConfig::PowerStation(c) => PowerStation::from_config(c).map(Node::PowerStation),
            NodeConfig::Junction(c) => Junction::from_config(c).map(Node::Junction),
        }
    }

    pub fn as_reservoir(&self) -> Option<&Reservoir> {
        match self {
            Node::Reservoir(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_power_station(&self) -> Option<&PowerStation> {
        match self {
            Node::PowerStation(p) => Some(p),
            _ => None,
        }
    }

    fn hydro(&self) -> &dyn HydroNode {
        match self {
            Node::Reservoir(r) => r,
            Node::PowerStation(p) => p,
            Node::Junction(j) => j,
        }
    }
}

impl HydroNode for Node {
    fn id(&self) -> NodeId {
        self.hydro().id()
    }

    fn name(&self) -> &str {
        self.hydro().name()
    }

    fn kind(&self) -> NodeKind {
        self.hydro().kind()
    }

    fn storage_mm3(&self) -> f64 {
        self.hydro().storage_mm3()
    }

    fn remaining_mm3(&self) -> f64 {
        self.hydro().remaining_mm3()
    }
}
