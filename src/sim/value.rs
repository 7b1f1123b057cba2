//! End-of-horizon value of a run as a function of the terminal price.

use crate::nodes::NodeKind;
use crate::topology::Topology;

/// Snapshot of a completed run, enough to value it at any terminal price.
///
/// The value of a run at price `p` is its profit plus the energy still
/// obtainable from stored water, priced at `p`:
///
/// ```
/// use river_sim::sim::value::ValueFunction;
///
/// let vf = ValueFunction {
///     profit: 1000.0,
///     remaining_mwh: 20.0,
///     remaining_mm3: 4.0,
///     node_remaining_mm3: vec![4.0, 0.0],
/// };
/// assert_eq!(vf.value_at(50.0), 2000.0);
/// assert_eq!(vf.marginal_value(50.0), 250.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    /// Income minus costs over the horizon.
    pub profit: f64,
    /// Energy producible from all water left above reservoir LRW and in
    /// transit, through every station downstream of it (MWh).
    pub remaining_mwh: f64,
    pub remaining_mm3: f64,
    /// Remaining water per node (Mm³).
    pub node_remaining_mm3: Vec<f64>,
}

impl ValueFunction {
    /// Builds the snapshot from per-node remaining water.
    ///
    /// # Arguments
    ///
    /// * `topology` - Network the run used
    /// * `profit` - Income minus costs
    /// * `node_remaining_mm3` - Water left per node, indexed by node id
    /// * `energy_per_mm3` - MWh per Mm³ per node, zero for non-stations
    pub fn from_run(
        topology: &Topology,
        profit: f64,
        node_remaining_mm3: Vec<f64>,
        energy_per_mm3: &[f64],
    ) -> Self {
        // Water flows on along each node's main path and is counted once
        // at every station it passes.
        let mut carried = node_remaining_mm3.clone();
        let mut remaining_mwh = 0.0;
        for &id in topology.order() {
            if topology.kind(id) == Some(NodeKind::PowerStation) {
                remaining_mwh += energy_per_mm3[id] * carried[id];
            }
            if let Some(next) = topology.primary_downstream(id) {
                carried[next] += carried[id];
            }
        }
        Self {
            profit,
            remaining_mwh,
            remaining_mm3: node_remaining_mm3.iter().sum(),
            node_remaining_mm3,
        }
    }

    /// Profit plus remaining energy priced at `price`.
    pub fn value_at(&self, price: f64) -> f64 {
        self.profit + self.remaining_mwh * price
    }

    /// Value of one more Mm³ of stored water at `price`.
    pub fn marginal_value(&self, price: f64) -> f64 {
        if self.remaining_mm3 <= 0.0 {
            0.0
        } else {
            price * self.remaining_mwh / self.remaining_mm3
        }
    }

    /// `(price, value)` pairs for each entry of `prices`.
    pub fn table(&self, prices: &[f64]) -> Vec<(f64, f64)> {
        prices.iter().map(|&p| (p, self.value_at(p))).collect()
    }
}
