//! Core simulation types: engine state, dataset shape, per-step records,
//! and run summaries.

use std::fmt;

use chrono::NaiveDateTime;

use crate::nodes::NodeKind;
use crate::sim::balance::WaterBalance;

/// Lifecycle of an [`Engine`](crate::sim::engine::Engine).
///
/// `Unprepared` until a dataset has been checked by `prepare`, `Prepared`
/// afterwards, and `Ran` once at least one run has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Unprepared,
    Prepared,
    Ran,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Unprepared => "unprepared",
            EngineState::Prepared => "prepared",
            EngineState::Ran => "ran",
        };
        f.write_str(s)
    }
}

/// Dimensions a dataset must keep between `prepare` and `run`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetShape {
    pub steps: usize,
    pub dt_seconds: f64,
    pub start: NaiveDateTime,
    pub kinds: Vec<NodeKind>,
}

impl DatasetShape {
    pub fn nodes(&self) -> usize {
        self.kinds.len()
    }
}

/// Outputs of one node for one step, as written into the dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStep {
    /// Level fraction at end of step; zero for nodes without storage.
    pub level: f64,
    /// Action actually applied.
    pub action: f64,
    /// Total outflow (m³/s).
    pub outflow_m3s: f64,
    /// Overflow and forced spill (m³/s).
    pub spill_m3s: f64,
    pub production_mwh: f64,
    /// A requested release or flow requirement was not met.
    pub shortage: bool,
}

/// Aggregate figures for one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub production_mwh: f64,
    pub income: f64,
    /// Start/stop, adjustment, and penalty costs.
    pub cost: f64,
    pub spill_mm3: f64,
    /// Node-steps flagged with a shortage.
    pub shortage_count: usize,
    /// Terminal price applied to water left in storage.
    pub residual_price: f64,
    /// Remaining water valued at the residual price.
    pub terminal_value: f64,
    pub balance: WaterBalance,
}

impl RunSummary {
    pub fn profit(&self) -> f64 {
        self.income - self.cost
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ({} steps) ---", self.steps)?;
        writeln!(f, "Production:        {:.2} MWh", self.production_mwh)?;
        writeln!(f, "Income:            {:.2}", self.income)?;
        writeln!(f, "Cost:              {:.2}", self.cost)?;
        writeln!(f, "Spill:             {:.4} Mm3", self.spill_mm3)?;
        writeln!(f, "Shortages:         {}", self.shortage_count)?;
        writeln!(
            f,
            "Terminal value:    {:.2} (rest price {:.2})",
            self.terminal_value, self.residual_price
        )?;
        write!(
            f,
            "Balance error:     {:.2e} Mm3",
            self.balance.max_error()
        )
    }
}
