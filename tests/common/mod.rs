//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use river_sim::config::{NodeConfig, SystemConfig};
use river_sim::nodes::Reservoir;
use river_sim::session::Session;

/// Hourly steps in the end-to-end scenario.
pub const HORIZON: usize = 5;

/// Mini network (reservoir 0 feeding station 1) over `steps` hourly steps.
pub fn mini_config(steps: usize) -> SystemConfig {
    let mut config = SystemConfig::mini();
    config.simulation.steps = steps;
    config
}

/// Session with a dataset built from the configuration and a prepared engine.
pub fn prepared_session(config: SystemConfig) -> Session {
    let mut session = Session::new(config);
    session.build_dataset().expect("dataset should build");
    session.build_engine().expect("engine should build");
    session.prepare().expect("engine should prepare");
    session
}

/// Reservoir model of node `id`, used to turn level fractions into volumes.
pub fn reservoir(config: &SystemConfig, id: usize) -> Reservoir {
    let cfg = config
        .nodes
        .iter()
        .find_map(|n| match n {
            NodeConfig::Reservoir(r) if r.id == id => Some(r),
            _ => None,
        })
        .expect("node should be a reservoir");
    Reservoir::from_config(cfg).expect("reservoir config should be valid")
}

/// Converts a flow held for one step into Mm³.
pub fn step_volume_mm3(flow_m3s: f64, dt_seconds: f64) -> f64 {
    flow_m3s * dt_seconds / 1e6
}
