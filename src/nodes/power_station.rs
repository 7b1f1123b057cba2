use crate::config::PowerStationConfig;
use crate::nodes::curve::Curve;
use crate::nodes::types::{GRAVITY, HydroNode, NodeId, NodeKind, SECONDS_PER_HOUR};

/// Actions below this run the turbine down to zero.
pub const MIN_ACTION: f64 = 0.01;
/// Output above which the unit counts as running (MW).
const RUNNING_MW: f64 = 0.001;
/// Output change that counts as an adjustment (MW).
const ADJUSTMENT_MW: f64 = 0.1;

/// Daily limit on output changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentLimit {
    pub per_day: usize,
    pub cost: f64,
}

/// Production outcome for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StationStep {
    pub power_mw: f64,
    pub energy_mwh: f64,
    pub income: f64,
    pub start_stop_cost: f64,
    /// Net head after losses (m).
    pub head_m: f64,
}

/// A hydro power station fed through the tunnel of one reservoir.
///
/// The action maps linearly onto turbine flow between the minimum and
/// maximum discharge; actions below [`MIN_ACTION`] stop the unit. A
/// mandatory minimum flow is passed through regardless.
#[derive(Debug, Clone)]
pub struct PowerStation {
    id: NodeId,
    name: String,
    pub downstream: Option<NodeId>,
    pub outlet_masl: f64,
    pub min_discharge_m3s: f64,
    pub max_discharge_m3s: f64,
    pub min_flow_m3s: f64,
    turbine: Curve,
    pub generator_efficiency: f64,
    pub head_loss_coef: f64,
    pub start_stop_cost: f64,
    pub energy_equivalent_kwh_m3: Option<f64>,
    pub initial_power_mw: f64,
    pub max_adjustments: Option<AdjustmentLimit>,

    power_mw: f64,
}

impl PowerStation {
    /// Builds a power station from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn from_config(cfg: &PowerStationConfig) -> Result<Self, String> {
        let turbine =
            Curve::new(&cfg.turbine_curve).map_err(|e| format!("turbine_curve: {e}"))?;
        if turbine.y_min() < 0.0 || turbine.y_max() > 100.0 {
            return Err("turbine_curve efficiencies must lie in 0..=100 %".to_string());
        }
        if cfg.min_discharge_m3s < 0.0 || cfg.max_discharge_m3s < cfg.min_discharge_m3s {
            return Err(
                "discharges must satisfy 0 <= min_discharge <= max_discharge".to_string(),
            );
        }
        if !(cfg.generator_efficiency > 0.0 && cfg.generator_efficiency <= 1.0) {
            return Err("generator_efficiency must lie in (0, 1]".to_string());
        }
        if cfg.head_loss_coef < 0.0 || cfg.min_flow_m3s < 0.0 || cfg.start_stop_cost < 0.0 {
            return Err("head_loss_coef, min_flow_m3s and start_stop_cost must be >= 0".to_string());
        }
        if let Some(eq) = cfg.energy_equivalent_kwh_m3 {
            if !(eq > 0.0) {
                return Err("energy_equivalent_kwh_m3 must be > 0".to_string());
            }
        }
        let max_adjustments = match &cfg.max_adjustments {
            Some(a) if a.cost < 0.0 => {
                return Err("max_adjustments.cost must be >= 0".to_string());
            }
            Some(a) => Some(AdjustmentLimit {
                per_day: a.per_day,
                cost: a.cost,
            }),
            None => None,
        };

        Ok(Self {
            id: cfg.id,
            name: cfg.name.clone(),
            downstream: cfg.downstream,
            outlet_masl: cfg.outlet_masl,
            min_discharge_m3s: cfg.min_discharge_m3s,
            max_discharge_m3s: cfg.max_discharge_m3s,
            min_flow_m3s: cfg.min_flow_m3s,
            turbine,
            generator_efficiency: cfg.generator_efficiency,
            head_loss_coef: cfg.head_loss_coef,
            start_stop_cost: cfg.start_stop_cost,
            energy_equivalent_kwh_m3: cfg.energy_equivalent_kwh_m3,
            initial_power_mw: cfg.initial_power_mw,
            max_adjustments,
            power_mw: cfg.initial_power_mw,
        })
    }

    /// Output at the end of the last step (MW).
    pub fn power_mw(&self) -> f64 {
        self.power_mw
    }

    pub fn reset(&mut self) {
        self.power_mw = self.initial_power_mw;
    }

    /// Tunnel flow requested at `action`, including the mandatory minimum.
    pub fn requested_flow(&self, action: f64) -> f64 {
        let turbine = if action < MIN_ACTION {
            0.0
        } else {
            self.min_discharge_m3s + action * (self.max_discharge_m3s - self.min_discharge_m3s)
        };
        turbine.max(self.min_flow_m3s)
    }

    /// Action consistent with a delivered flow below the request.
    pub fn action_for_flow(&self, flow_m3s: f64) -> f64 {
        let span = self.max_discharge_m3s - self.min_discharge_m3s;
        if span <= 0.0 {
            return if flow_m3s >= self.max_discharge_m3s && flow_m3s > 0.0 {
                1.0
            } else {
                0.0
            };
        }
        let action = (flow_m3s - self.min_discharge_m3s) / span;
        if action < MIN_ACTION {
            0.0
        } else {
            action.min(1.0)
        }
    }

    /// Converts routed flow into production for one step.
    ///
    /// # Arguments
    ///
    /// * `flow_m3s` - Flow through the turbines
    /// * `start_masl` / `end_masl` - Intake reservoir level around the step
    /// * `price` - Energy price for the step
    /// * `dt_s` - Step length in seconds
    pub fn step(
        &mut self,
        flow_m3s: f64,
        start_masl: f64,
        end_masl: f64,
        price: f64,
        dt_s: f64,
    ) -> StationStep {
        let gross_head = 0.5 * (start_masl + end_masl) - self.outlet_masl;
        let head_m = gross_head - self.head_loss_coef * flow_m3s * flow_m3s;
        let power_mw = if flow_m3s <= 0.0 || flow_m3s < self.min_discharge_m3s || head_m <= 0.0 {
            0.0
        } else {
            let efficiency = self.turbine.eval(flow_m3s) / 100.0;
            efficiency * 1000.0 * GRAVITY * head_m * flow_m3s / 1e6 * self.generator_efficiency
        };
        let energy_mwh = power_mw * dt_s / SECONDS_PER_HOUR;

        let was_running = self.power_mw > RUNNING_MW;
        let is_running = power_mw > RUNNING_MW;
        let start_stop_cost = if was_running != is_running {
            0.5 * self.start_stop_cost
        } else {
            0.0
        };
        self.power_mw = power_mw;

        StationStep {
            power_mw,
            energy_mwh,
            income: energy_mwh * price,
            start_stop_cost,
            head_m,
        }
    }

    /// Cost of exceeding the daily adjustment limit over a full output series.
    ///
    /// Each complete day of `steps_per_day` steps is charged once if it
    /// holds more output changes than allowed. A trailing partial day is
    /// not charged. The first step compares against the initial output.
    pub fn adjustment_cost(&self, power_mw: &[f64], steps_per_day: usize) -> f64 {
        let Some(limit) = &self.max_adjustments else {
            return 0.0;
        };
        let mut previous = self.initial_power_mw;
        let mut cost = 0.0;
        for day in power_mw.chunks_exact(steps_per_day.max(1)) {
            let mut changes = 0;
            for &p in day {
                if (p - previous).abs() > ADJUSTMENT_MW {
                    changes += 1;
                }
                previous = p;
            }
            if changes > limit.per_day {
                cost += limit.cost;
            }
        }
        cost
    }

    /// Energy obtained from one Mm³ released at `intake_masl` (MWh/Mm³).
    ///
    /// Uses the configured energy equivalent or derives one from the gross
    /// head and the best turbine efficiency.
    pub fn energy_per_mm3(&self, intake_masl: f64) -> f64 {
        let kwh_m3 = self.energy_equivalent_kwh_m3.unwrap_or_else(|| {
            let head = (intake_masl - self.outlet_masl).max(0.0);
            GRAVITY * head * self.turbine.y_max() / 100.0 * self.generator_efficiency
                / SECONDS_PER_HOUR
        });
        kwh_m3 * 1000.0
    }
}

impl HydroNode for PowerStation {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::PowerStation
    }

    fn storage_mm3(&self) -> f64 {
        0.0
    }

    fn remaining_mm3(&self) -> f64 {
        0.0
    }
}
