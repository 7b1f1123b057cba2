//! Default dispatch decisions for steps the caller left unset.

use chrono::NaiveDateTime;

use crate::nodes::{HydroNode, Node, NodeId, NodeKind};

/// What a policy sees when asked for one action.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub node: &'a Node,
    pub t: usize,
    pub time: NaiveDateTime,
    /// Energy price of step `t`.
    pub price: f64,
    /// Terminal price valuing water kept in storage.
    pub rest_price: f64,
}

impl PolicyContext<'_> {
    pub fn node_id(&self) -> NodeId {
        self.node.id()
    }
}

/// Chooses the action of a dispatchable node when the dataset holds no
/// request for it.
///
/// Implementations return a value in `[0, 1]`; the engine clamps
/// anything outside that range.
pub trait DispatchPolicy {
    fn action(&self, ctx: &PolicyContext<'_>) -> f64;
}

/// Produces whenever the step price is at least the value of keeping the
/// water; keeps reservoir hatches at their minimum.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaterValuePolicy;

impl DispatchPolicy for WaterValuePolicy {
    fn action(&self, ctx: &PolicyContext<'_>) -> f64 {
        match ctx.node.kind() {
            NodeKind::PowerStation if ctx.price >= ctx.rest_price => 1.0,
            _ => 0.0,
        }
    }
}

/// Applies the same action to every unset node-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPolicy(pub f64);

impl DispatchPolicy for ConstantPolicy {
    fn action(&self, _ctx: &PolicyContext<'_>) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;
    use crate::topology::Topology;

    fn ctx(node: &Node, price: f64) -> PolicyContext<'_> {
        PolicyContext {
            node,
            t: 0,
            time: NaiveDateTime::default(),
            price,
            rest_price: 30.0,
        }
    }

    #[test]
    fn station_runs_when_price_beats_rest_price() {
        let topo = Topology::build(&SystemConfig::mini()).unwrap();
        let station = topo.node(1).unwrap();
        assert_eq!(WaterValuePolicy.action(&ctx(station, 30.0)), 1.0);
        assert_eq!(WaterValuePolicy.action(&ctx(station, 29.9)), 0.0);
    }

    #[test]
    fn reservoir_hatch_stays_at_minimum() {
        let topo = Topology::build(&SystemConfig::mini()).unwrap();
        let reservoir = topo.node(0).unwrap();
        assert_eq!(WaterValuePolicy.action(&ctx(reservoir, 500.0)), 0.0);
        assert_eq!(ctx(reservoir, 0.0).node_id(), 0);
    }

    #[test]
    fn constant_policy() {
        let topo = Topology::build(&SystemConfig::mini()).unwrap();
        let station = topo.node(1).unwrap();
        assert_eq!(ConstantPolicy(0.4).action(&ctx(station, 0.0)), 0.4);
    }
}
