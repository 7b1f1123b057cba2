//! Time-series store for exogenous inputs and simulation outputs.
//!
//! All per-node series are flat `steps × nodes` arrays. Every accessor
//! checks its indices before touching anything, so a failed call leaves
//! the dataset unchanged.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::config::{NodeConfig, SystemConfig};
use crate::error::{IndexError, SeriesError, SimError};
use crate::io::series;
use crate::nodes::NodeKind;
use crate::sim::clock::Clock;
use crate::sim::types::{DatasetShape, NodeStep};

/// Inputs and outputs of one simulation horizon.
///
/// # Actions
///
/// Each `(node, t)` has a *requested* action, set by the caller or left
/// unset, and a *reported* action. [`Dataset::set_action`] writes both;
/// a run replaces the reported value with the action actually applied
/// and never touches the request, so repeated runs see the same inputs.
///
/// # Prices
///
/// `price[t]` is the energy price of step `t`. `rest_price` is the single
/// terminal price valuing water left after the horizon. The residual
/// price reported after a run is the `rest_price` that run applied.
#[derive(Debug, Clone)]
pub struct Dataset {
    steps: usize,
    dt_seconds: f64,
    kinds: Vec<NodeKind>,
    /// Allowed level fraction range per node (reservoirs only).
    level_bounds: Vec<Option<(f64, f64)>>,
    /// Whether an action on the node reaches an outlet.
    dispatchable: Vec<bool>,
    calendar: Vec<NaiveDateTime>,

    price: Vec<f64>,
    rest_price: f64,
    inflow: Vec<f64>,
    requested_action: Vec<Option<f64>>,
    initial_level: Vec<f64>,

    level: Vec<f64>,
    action: Vec<f64>,
    outflow: Vec<f64>,
    spill: Vec<f64>,
    production: Vec<f64>,
    shortage: Vec<bool>,
    residual_price: Option<f64>,
}

impl Dataset {
    /// Zeroed dataset sized for `config`'s horizon and node list.
    ///
    /// Initial levels come from each reservoir's `initial_fraction` and
    /// the rest price from `[economy]`.
    pub fn new(config: &SystemConfig) -> Self {
        let steps = config.horizon();
        let nodes = config.node_count();
        let mut kinds = vec![NodeKind::Junction; nodes];
        let mut level_bounds = vec![None; nodes];
        let mut dispatchable = vec![false; nodes];
        let mut initial_level = vec![0.0; nodes];
        for node in &config.nodes {
            let id = node.id();
            if id >= nodes {
                continue;
            }
            kinds[id] = node.kind();
            dispatchable[id] = node.kind().is_dispatchable();
            if let NodeConfig::Reservoir(r) = node {
                level_bounds[id] = Some((r.min_fraction, r.max_fraction));
                initial_level[id] = r.initial_fraction;
                dispatchable[id] = r.hatch.is_some();
            }
        }
        let cells = steps * nodes;
        let calendar = Clock::new(
            config.simulation.start,
            config.simulation.dt_seconds,
            steps,
        )
        .map(|tick| tick.time)
        .collect();

        Self {
            steps,
            dt_seconds: config.simulation.dt_seconds,
            kinds,
            level_bounds,
            dispatchable,
            calendar,
            price: vec![0.0; steps],
            rest_price: config.economy.rest_price,
            inflow: vec![0.0; cells],
            requested_action: vec![None; cells],
            initial_level,
            level: vec![0.0; cells],
            action: vec![0.0; cells],
            outflow: vec![0.0; cells],
            spill: vec![0.0; cells],
            production: vec![0.0; cells],
            shortage: vec![false; cells],
            residual_price: None,
        }
    }

    /// Dataset filled from the series files named in `config.paths`.
    ///
    /// Uses the stored resolved paths when present. Files are matched to
    /// steps by row position; rows beyond the horizon are ignored. A
    /// config without series files yields [`Dataset::new`].
    ///
    /// # Errors
    ///
    /// Returns `SimError::Series` for unreadable or short files and the
    /// usual accessor errors for values that do not fit the network.
    pub fn from_files(config: &SystemConfig) -> Result<Self, SimError> {
        let paths = match config.resolved_paths() {
            Some(p) => p.clone(),
            None => config.derive_paths(),
        };
        let mut data = Self::new(config);
        let steps = data.steps;
        let too_short = |path: &Path, rows: usize| SeriesError::TooShort {
            path: path.display().to_string(),
            rows,
            steps: config.horizon(),
        };

        if let Some(path) = &paths.price_file {
            let prices = series::read_prices(path)?;
            if prices.len() < data.steps {
                return Err(too_short(path, prices.len()).into());
            }
            data.warn_on_calendar_drift(path, &prices.timestamps);
            if let Some(rest) = prices.rest_price {
                data.set_rest_price(rest)?;
            }
            for (t, &p) in prices.prices.iter().take(data.steps).enumerate() {
                data.set_price(t, p, data.rest_price)?;
            }
        }
        if let Some(path) = &paths.inflow_file {
            let table = series::read_node_table(path)?;
            if table.len() < data.steps {
                return Err(too_short(path, table.len()).into());
            }
            data.warn_on_calendar_drift(path, &table.timestamps);
            for (t, node, value) in table.cells().filter(|&(t, _, _)| t < steps) {
                data.set_inflow(t, node, value)?;
            }
        }
        if let Some(path) = &paths.action_file {
            let table = series::read_node_table(path)?;
            if table.len() < data.steps {
                return Err(too_short(path, table.len()).into());
            }
            for (t, node, value) in table.cells().filter(|&(t, _, _)| t < steps) {
                data.set_action(node, t, value)?;
            }
        }
        tracing::info!(
            steps = data.steps,
            nodes = data.node_count(),
            rest_price = data.rest_price,
            "dataset loaded"
        );
        Ok(data)
    }

    fn warn_on_calendar_drift(&self, path: &Path, stamps: &[NaiveDateTime]) {
        if let (Some(first), Some(start)) = (stamps.first(), self.calendar.first()) {
            if first != start {
                tracing::warn!(
                    file = %path.display(),
                    file_start = %first,
                    calendar_start = %start,
                    "series does not start at the configured calendar start"
                );
            }
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn dt_seconds(&self) -> f64 {
        self.dt_seconds
    }

    pub fn kinds(&self) -> &[NodeKind] {
        &self.kinds
    }

    pub fn calendar(&self) -> &[NaiveDateTime] {
        &self.calendar
    }

    /// Dimensions checked by the engine between `prepare` and `run`.
    pub fn shape(&self) -> DatasetShape {
        DatasetShape {
            steps: self.steps,
            dt_seconds: self.dt_seconds,
            start: self.calendar.first().copied().unwrap_or_default(),
            kinds: self.kinds.clone(),
        }
    }

    fn check_step(&self, t: usize) -> Result<(), IndexError> {
        if t < self.steps {
            Ok(())
        } else {
            Err(IndexError::Step {
                t,
                horizon: self.steps,
            })
        }
    }

    fn check_node(&self, node: usize) -> Result<(), IndexError> {
        if node < self.kinds.len() {
            Ok(())
        } else {
            Err(IndexError::Node {
                node,
                count: self.kinds.len(),
            })
        }
    }

    fn cell(&self, t: usize, node: usize) -> Result<usize, IndexError> {
        self.check_step(t)?;
        self.check_node(node)?;
        Ok(t * self.kinds.len() + node)
    }

    pub fn timestamp(&self, t: usize) -> Result<NaiveDateTime, IndexError> {
        self.check_step(t)?;
        Ok(self.calendar[t])
    }

    // Prices

    pub fn price(&self, t: usize) -> Result<f64, IndexError> {
        self.check_step(t)?;
        Ok(self.price[t])
    }

    /// Sets the price of step `t` and the terminal rest price.
    ///
    /// Both fields are written; pass the current [`Dataset::rest_price`]
    /// to leave the terminal price as it is. The residual price reported
    /// by [`Dataset::residual_price`] only changes on the next run.
    ///
    /// # Errors
    ///
    /// `IndexError` for an out-of-range step, `InvalidValue` for a
    /// non-finite price.
    pub fn set_price(&mut self, t: usize, price: f64, rest_price: f64) -> Result<(), SimError> {
        self.check_step(t)?;
        finite("price", price)?;
        finite("rest_price", rest_price)?;
        self.price[t] = price;
        self.rest_price = rest_price;
        Ok(())
    }

    pub fn rest_price(&self) -> f64 {
        self.rest_price
    }

    /// # Errors
    ///
    /// `InvalidValue` for a non-finite price.
    pub fn set_rest_price(&mut self, rest_price: f64) -> Result<(), SimError> {
        finite("rest_price", rest_price)?;
        self.rest_price = rest_price;
        Ok(())
    }

    /// Rest price applied by the last completed run.
    pub fn residual_price(&self) -> Option<f64> {
        self.residual_price
    }

    // Inflow

    pub fn inflow(&self, t: usize, node: usize) -> Result<f64, IndexError> {
        Ok(self.inflow[self.cell(t, node)?])
    }

    /// # Errors
    ///
    /// `IndexError` for out-of-range indices, `InvalidValue` for a
    /// negative or non-finite inflow.
    pub fn set_inflow(&mut self, t: usize, node: usize, value: f64) -> Result<(), SimError> {
        let i = self.cell(t, node)?;
        if !(value.is_finite() && value >= 0.0) {
            return Err(SimError::InvalidValue {
                field: "inflow",
                value,
                reason: "must be finite and >= 0".to_string(),
            });
        }
        self.inflow[i] = value;
        Ok(())
    }

    // Initial level

    pub fn initial_level(&self, node: usize) -> Result<f64, IndexError> {
        self.check_node(node)?;
        Ok(self.initial_level[node])
    }

    /// Sets the level fraction a reservoir starts the next run from.
    ///
    /// # Errors
    ///
    /// `IndexError` for an unknown node, `WrongNodeKind` for a node other
    /// than a reservoir, `InvalidValue` outside the reservoir's
    /// `[min_fraction, max_fraction]`.
    pub fn set_initial_level(&mut self, node: usize, value: f64) -> Result<(), SimError> {
        self.check_node(node)?;
        let Some((min, max)) = self.level_bounds[node] else {
            return Err(SimError::WrongNodeKind {
                node,
                operation: "set_initial_level",
                expected: "reservoir",
                found: self.kinds[node],
            });
        };
        if !(min..=max).contains(&value) {
            return Err(SimError::InvalidValue {
                field: "initial_level",
                value,
                reason: format!("must lie in [{min}, {max}]"),
            });
        }
        self.initial_level[node] = value;
        Ok(())
    }

    // Actions

    /// Reported action: the last value set, or the action applied by the
    /// last run. Zero when neither exists.
    pub fn action(&self, node: usize, t: usize) -> Result<f64, IndexError> {
        Ok(self.action[self.cell(t, node)?])
    }

    /// Caller's request for `(node, t)`, `None` when left to the policy.
    pub fn requested_action(&self, node: usize, t: usize) -> Result<Option<f64>, IndexError> {
        Ok(self.requested_action[self.cell(t, node)?])
    }

    /// # Errors
    ///
    /// `IndexError` for out-of-range indices, `WrongNodeKind` for a
    /// junction or a reservoir without a hatch, `InvalidValue` outside
    /// `[0, 1]`.
    pub fn set_action(&mut self, node: usize, t: usize, value: f64) -> Result<(), SimError> {
        let i = self.cell(t, node)?;
        if !self.dispatchable[node] {
            return Err(SimError::WrongNodeKind {
                node,
                operation: "set_action",
                expected: "power station or reservoir with a hatch",
                found: self.kinds[node],
            });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SimError::InvalidValue {
                field: "action",
                value,
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        self.requested_action[i] = Some(value);
        self.action[i] = value;
        Ok(())
    }

    /// Hands `(node, t)` back to the dispatch policy.
    pub fn clear_action(&mut self, node: usize, t: usize) -> Result<(), IndexError> {
        let i = self.cell(t, node)?;
        self.requested_action[i] = None;
        Ok(())
    }

    // Outputs

    /// Level fraction of `node` at the end of step `t`.
    pub fn level(&self, node: usize, t: usize) -> Result<f64, IndexError> {
        Ok(self.level[self.cell(t, node)?])
    }

    /// Total outflow of `node` during step `t` (m³/s).
    pub fn outflow(&self, node: usize, t: usize) -> Result<f64, IndexError> {
        Ok(self.outflow[self.cell(t, node)?])
    }

    /// Overflow and forced spill of `node` during step `t` (m³/s).
    pub fn spill(&self, node: usize, t: usize) -> Result<f64, IndexError> {
        Ok(self.spill[self.cell(t, node)?])
    }

    /// Energy produced by `node` during step `t` (MWh).
    pub fn production(&self, node: usize, t: usize) -> Result<f64, IndexError> {
        Ok(self.production[self.cell(t, node)?])
    }

    pub fn is_shortage(&self, node: usize, t: usize) -> Result<bool, IndexError> {
        Ok(self.shortage[self.cell(t, node)?])
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.level.fill(0.0);
        self.outflow.fill(0.0);
        self.spill.fill(0.0);
        self.production.fill(0.0);
        self.shortage.fill(false);
        for (action, requested) in self.action.iter_mut().zip(&self.requested_action) {
            *action = requested.unwrap_or(0.0);
        }
    }

    /// Writes one node's step outputs. Indices come from the engine's own
    /// loop, which is bounded by the prepared shape.
    pub(crate) fn record(&mut self, node: usize, t: usize, step: &NodeStep) {
        let i = t * self.kinds.len() + node;
        self.level[i] = step.level;
        self.action[i] = step.action;
        self.outflow[i] = step.outflow_m3s;
        self.spill[i] = step.spill_m3s;
        self.production[i] = step.production_mwh;
        self.shortage[i] = step.shortage;
    }

    pub(crate) fn set_residual_price(&mut self, price: f64) {
        self.residual_price = Some(price);
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), SimError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidValue {
            field,
            value,
            reason: "must be finite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mini() -> Dataset {
        let mut cfg = SystemConfig::mini();
        cfg.simulation.steps = 5;
        Dataset::new(&cfg)
    }

    #[test]
    fn new_is_sized_and_zeroed() {
        let data = mini();
        assert_eq!(data.steps(), 5);
        assert_eq!(data.node_count(), 2);
        assert_eq!(data.kinds(), &[NodeKind::Reservoir, NodeKind::PowerStation]);
        assert_eq!(data.calendar().len(), 5);
        assert_eq!(data.price(4), Ok(0.0));
        assert_eq!(data.inflow(4, 1), Ok(0.0));
        assert_eq!(data.initial_level(0), Ok(0.5));
        assert_eq!(data.rest_price(), 30.0);
        assert_eq!(data.residual_price(), None);
    }

    #[test]
    fn out_of_range_fails_without_mutation() {
        let mut data = mini();
        let before = data.clone();
        assert!(matches!(
            data.set_inflow(5, 0, 1.0),
            Err(SimError::Index(IndexError::Step { t: 5, horizon: 5 }))
        ));
        assert!(matches!(
            data.set_action(2, 0, 0.5),
            Err(SimError::Index(IndexError::Node { node: 2, count: 2 }))
        ));
        assert!(data.set_price(9, 1.0, 99.0).is_err());
        assert_eq!(data.rest_price(), before.rest_price());
        assert_eq!(data.level(0, 5), Err(IndexError::Step { t: 5, horizon: 5 }));
    }

    #[test]
    fn set_price_updates_both_fields() {
        let mut data = mini();
        data.set_price(1, 99.9, 35.0).unwrap();
        assert_eq!(data.price(1), Ok(99.9));
        assert_eq!(data.rest_price(), 35.0);
        assert_eq!(data.residual_price(), None);
    }

    #[test]
    fn action_round_trips_and_keeps_request() {
        let mut data = mini();
        data.set_action(1, 1, 0.75).unwrap();
        assert_eq!(data.action(1, 1), Ok(0.75));
        assert_eq!(data.requested_action(1, 1), Ok(Some(0.75)));
        assert_eq!(data.requested_action(1, 0), Ok(None));

        data.record(
            1,
            1,
            &NodeStep {
                action: 0.5,
                ..NodeStep::default()
            },
        );
        assert_eq!(data.action(1, 1), Ok(0.5));
        assert_eq!(data.requested_action(1, 1), Ok(Some(0.75)));

        data.clear_outputs();
        assert_eq!(data.action(1, 1), Ok(0.75));
        data.clear_action(1, 1).unwrap();
        assert_eq!(data.requested_action(1, 1), Ok(None));
    }

    #[test]
    fn value_checks() {
        let mut data = mini();
        assert!(matches!(
            data.set_inflow(0, 0, -1.0),
            Err(SimError::InvalidValue { field: "inflow", .. })
        ));
        assert!(data.set_inflow(0, 0, f64::NAN).is_err());
        assert!(matches!(
            data.set_action(1, 0, 1.5),
            Err(SimError::InvalidValue { field: "action", .. })
        ));
        assert!(matches!(
            data.set_initial_level(1, 0.3),
            Err(SimError::WrongNodeKind { node: 1, .. })
        ));
        assert!(data.set_initial_level(0, 1.2).is_err());
        data.set_initial_level(0, 0.33).unwrap();
        assert_eq!(data.initial_level(0), Ok(0.33));
    }

    #[test]
    fn junction_takes_no_action() {
        let data_cfg = SystemConfig::cascade();
        let mut data = Dataset::new(&data_cfg);
        assert!(matches!(
            data.set_action(3, 0, 0.5),
            Err(SimError::WrongNodeKind {
                found: NodeKind::Junction,
                ..
            })
        ));
        assert_eq!(data.action(3, 0), Ok(0.0));
    }

    #[test]
    fn reservoir_without_hatch_takes_no_action() {
        let mut data = mini();
        assert!(matches!(
            data.set_action(0, 1, 0.6),
            Err(SimError::WrongNodeKind {
                node: 0,
                found: NodeKind::Reservoir,
                ..
            })
        ));
        assert_eq!(data.requested_action(0, 1), Ok(None));

        // The cascade's upper reservoir has a hatch; the lower one does not.
        let mut data = Dataset::new(&SystemConfig::cascade());
        data.set_action(0, 1, 0.6).unwrap();
        assert_eq!(data.action(0, 1), Ok(0.6));
        assert!(data.set_action(2, 1, 0.6).is_err());
    }

    #[test]
    fn from_files_ignores_rows_beyond_horizon() {
        let dir = std::env::temp_dir().join(format!("river_sim_files_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("inflow.csv"),
            "timestamp,0\n2024010100,1.5\n2024010101,2.5\n2024010102,9.0\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("actions.csv"),
            "timestamp,1\n2024010100,\n2024010101,0.4\n2024010102,1.0\n",
        )
        .unwrap();

        let mut cfg = SystemConfig::mini();
        cfg.simulation.steps = 2;
        cfg.paths.input_dir = dir.display().to_string();
        cfg.paths.inflow_file = "inflow.csv".to_string();
        cfg.paths.action_file = "actions.csv".to_string();
        let data = Dataset::from_files(&cfg);
        std::fs::remove_dir_all(&dir).unwrap();

        let data = data.unwrap();
        assert_eq!(data.inflow(0, 0), Ok(1.5));
        assert_eq!(data.inflow(1, 0), Ok(2.5));
        assert_eq!(data.requested_action(1, 0), Ok(None));
        assert_eq!(data.action(1, 1), Ok(0.4));
        assert!(data.inflow(2, 0).is_err());
    }

    #[test]
    fn calendar_follows_time_step() {
        let mut cfg = SystemConfig::mini();
        cfg.simulation.dt_seconds = 1800.0;
        let data = Dataset::new(&cfg);
        let gap = data.timestamp(1).unwrap() - data.timestamp(0).unwrap();
        assert_eq!(gap.num_seconds(), 1800);
        assert!(data.timestamp(24).is_err());
    }

    #[test]
    fn from_files_without_series_matches_new() {
        let cfg = SystemConfig::mini();
        let data = Dataset::from_files(&cfg).unwrap();
        assert_eq!(data.shape(), Dataset::new(&cfg).shape());
    }
}
