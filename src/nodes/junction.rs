use chrono::NaiveDateTime;

use crate::config::JunctionConfig;
use crate::nodes::season::SeasonalFlow;
use crate::nodes::types::{HydroNode, NodeId, NodeKind, SECONDS_PER_HOUR};

/// Outcome of one junction step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JunctionStep {
    pub outflow_m3s: f64,
    /// Requirement in force this step (m³/s), zero when none.
    pub required_m3s: f64,
    pub penalty: f64,
}

/// A confluence or river reach that sums upstream outputs.
///
/// With a travel time the reach is modelled as a cascade of storage
/// cells: each step every cell passes `decay` of its content to the
/// next, and the last cell feeds the downstream node.
#[derive(Debug, Clone)]
pub struct Junction {
    id: NodeId,
    name: String,
    pub downstream: Option<NodeId>,
    pub decay: f64,
    pub initial_flow_m3s: f64,
    pub requirements: SeasonalFlow,
    /// Routing cell contents (m³).
    cells: Vec<f64>,
}

impl Junction {
    /// Builds a junction from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn from_config(cfg: &JunctionConfig) -> Result<Self, String> {
        if !(cfg.decay > 0.0 && cfg.decay <= 1.0) {
            return Err("decay must lie in (0, 1]".to_string());
        }
        if cfg.initial_flow_m3s < 0.0 {
            return Err("initial_flow_m3s must be >= 0".to_string());
        }
        let requirements = SeasonalFlow::from_config(&cfg.requirements)
            .map_err(|e| format!("requirements: {e}"))?;
        Ok(Self {
            id: cfg.id,
            name: cfg.name.clone(),
            downstream: cfg.downstream,
            decay: cfg.decay,
            initial_flow_m3s: cfg.initial_flow_m3s,
            requirements,
            cells: vec![0.0; cfg.travel_time_steps],
        })
    }

    pub fn travel_time_steps(&self) -> usize {
        self.cells.len()
    }

    /// Fills every routing cell with one step of the initial flow.
    pub fn reset(&mut self, dt_s: f64) {
        let volume = self.initial_flow_m3s * dt_s;
        self.cells.iter_mut().for_each(|c| *c = volume);
    }

    /// Routes one step of inflow.
    pub fn step(&mut self, inflow_m3s: f64, date: &NaiveDateTime, dt_s: f64) -> JunctionStep {
        let outflow_m3s = match self.cells.last() {
            None => inflow_m3s,
            Some(&last) => {
                let out = last * self.decay;
                // Back to front so each cell sees its upstream neighbour's old content.
                for s in (0..self.cells.len()).rev() {
                    let incoming = if s == 0 {
                        inflow_m3s * dt_s
                    } else {
                        self.cells[s - 1] * self.decay
                    };
                    let outgoing = self.cells[s] * self.decay;
                    self.cells[s] += incoming - outgoing;
                }
                out / dt_s
            }
        };

        let mut out = JunctionStep {
            outflow_m3s,
            ..JunctionStep::default()
        };
        if let Some(req) = self.requirements.requirement(date) {
            out.required_m3s = req.flow_m3s;
            if outflow_m3s < req.flow_m3s {
                out.penalty = req.penalty_per_hour * dt_s / SECONDS_PER_HOUR;
            }
        }
        out
    }
}

impl HydroNode for Junction {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Junction
    }

    fn storage_mm3(&self) -> f64 {
        self.cells.iter().sum::<f64>() / 1e6
    }

    fn remaining_mm3(&self) -> f64 {
        self.storage_mm3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowPeriodConfig;
    use chrono::NaiveDate;

    const DT: f64 = 3600.0;

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn reach(travel: usize, decay: f64) -> Junction {
        let mut j = Junction::from_config(&JunctionConfig {
            id: 2,
            name: "Reach".to_string(),
            travel_time_steps: travel,
            decay,
            ..JunctionConfig::default()
        })
        .unwrap();
        j.reset(DT);
        j
    }

    #[test]
    fn pass_through_without_travel_time() {
        let mut j = reach(0, 1.0);
        assert_eq!(j.step(7.5, &date(), DT).outflow_m3s, 7.5);
        assert_eq!(j.storage_mm3(), 0.0);
    }

    #[test]
    fn full_decay_is_a_pure_lag() {
        let mut j = reach(2, 1.0);
        let outs: Vec<f64> = [10.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|&q| j.step(q, &date(), DT).outflow_m3s)
            .collect();
        assert_eq!(outs, vec![0.0, 0.0, 10.0, 0.0]);
    }

    #[test]
    fn routing_conserves_water() {
        let mut j = reach(3, 0.6);
        let mut released = 0.0;
        let inflow = [5.0, 8.0, 2.0, 0.0, 0.0];
        for &q in &inflow {
            released += j.step(q, &date(), DT).outflow_m3s * DT / 1e6;
        }
        let delivered: f64 = inflow.iter().map(|q| q * DT / 1e6).sum();
        assert!((delivered - released - j.storage_mm3()).abs() < 1e-12);
    }

    #[test]
    fn shortfall_against_requirement_is_penalised() {
        let mut j = Junction::from_config(&JunctionConfig {
            requirements: vec![FlowPeriodConfig {
                start: "01.06".to_string(),
                end: "31.08".to_string(),
                flow_m3s: 3.0,
                penalty_per_hour: 200.0,
            }],
            ..JunctionConfig::default()
        })
        .unwrap();
        let short = j.step(1.0, &date(), DT);
        assert_eq!(short.required_m3s, 3.0);
        assert_eq!(short.penalty, 200.0);
        let met = j.step(3.0, &date(), DT);
        assert_eq!(met.penalty, 0.0);
    }

    #[test]
    fn rejects_zero_decay() {
        let cfg = JunctionConfig {
            decay: 0.0,
            ..JunctionConfig::default()
        };
        assert!(Junction::from_config(&cfg).is_err());
    }
}
