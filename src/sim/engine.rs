//! Simulation engine that walks the river network through the horizon.

use tracing::{debug, info, warn};

use crate::config::SystemConfig;
use crate::dataset::Dataset;
use crate::error::{IndexError, NotReadyError, PreparationError, SimError};
use crate::nodes::junction::JunctionStep;
use crate::nodes::power_station::StationStep;
use crate::nodes::reservoir::{ReservoirInput, ReservoirStep};
use crate::nodes::season::Requirement;
use crate::nodes::types::{SECONDS_PER_HOUR, m3s_to_mm3};
use crate::nodes::{HydroNode, Node, NodeId, NodeKind};
use crate::topology::Topology;

use super::balance::BalanceTracker;
use super::clock::{Clock, Tick};
use super::policy::{DispatchPolicy, PolicyContext, WaterValuePolicy};
use super::types::{DatasetShape, EngineState, NodeStep, RunSummary};
use super::value::ValueFunction;

/// Per-node results of the last completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub income: Vec<f64>,
    pub cost: Vec<f64>,
    pub summary: RunSummary,
    pub value: ValueFunction,
}

/// Simulation engine owning the network and the dispatch policy.
///
/// Generic over `P: DispatchPolicy` for static dispatch. The dataset is
/// borrowed per call: `prepare` checks it against the network, `run`
/// writes its outputs into it. A run may be repeated any number of times
/// after one `prepare`, as long as the dataset keeps its shape.
pub struct Engine<P: DispatchPolicy = WaterValuePolicy> {
    topology: Topology,
    policy: P,
    steps: usize,
    dt_seconds: f64,
    steps_per_day: usize,
    state: EngineState,
    shape: Option<DatasetShape>,
    /// MWh per Mm³ for stations, zero elsewhere; filled by `prepare`.
    energy_per_mm3: Vec<f64>,
    outcome: Option<RunOutcome>,
}

/// Feeding reservoir's contribution to its station for one step.
#[derive(Debug, Clone, Copy, Default)]
struct Feed {
    start_masl: f64,
    end_masl: f64,
    action: f64,
    shortage: bool,
}

/// Tunnel request a reservoir serves for its station.
#[derive(Debug, Clone, Copy)]
struct TunnelPlan {
    station: NodeId,
    action: f64,
    request_m3s: f64,
}

enum Stepped {
    Reservoir {
        out: ReservoirStep,
        min_required: Option<Requirement>,
    },
    Station {
        out: StationStep,
        turbine_m3s: f64,
    },
    Junction(JunctionStep),
}

/// Running totals over one run.
struct Accumulator {
    income: Vec<f64>,
    cost: Vec<f64>,
    power: Vec<Vec<f64>>,
    balance: BalanceTracker,
    production_mwh: f64,
    spill_mm3: f64,
    shortage_count: usize,
    /// Flow delivered to each node during the current step (m³/s).
    routed: Vec<f64>,
    feeds: Vec<Option<Feed>>,
}

impl Engine<WaterValuePolicy> {
    /// Builds an engine with the default [`WaterValuePolicy`].
    ///
    /// # Errors
    ///
    /// See [`Engine::with_policy`].
    pub fn new(config: &SystemConfig) -> Result<Self, SimError> {
        Self::with_policy(config, WaterValuePolicy)
    }
}

impl<P: DispatchPolicy> Engine<P> {
    /// Builds an engine with a custom dispatch policy.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` for a zero horizon or an invalid time
    /// step, `SimError::Topology` if the node list does not form a valid
    /// network.
    pub fn with_policy(config: &SystemConfig, policy: P) -> Result<Self, SimError> {
        if let Some(err) = config.validate_horizon().into_iter().next() {
            return Err(err.into());
        }
        let topology = Topology::build(config)?;
        let dt_seconds = config.simulation.dt_seconds;
        let nodes = topology.len();
        Ok(Self {
            topology,
            policy,
            steps: config.horizon(),
            dt_seconds,
            steps_per_day: ((86_400.0 / dt_seconds).round() as usize).max(1),
            state: EngineState::Unprepared,
            shape: None,
            energy_per_mm3: vec![0.0; nodes],
            outcome: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Energy equivalent of `station` cached by `prepare` (MWh/Mm³).
    pub fn energy_per_mm3(&self, station: NodeId) -> Option<f64> {
        match self.topology.kind(station) {
            Some(NodeKind::PowerStation) => self.energy_per_mm3.get(station).copied(),
            _ => None,
        }
    }

    /// Results of the last run since the last `prepare`.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Checks `dataset` against the network and caches derived constants.
    ///
    /// # Errors
    ///
    /// Returns a `PreparationError` if the horizon, node count, node kinds,
    /// or time step differ from the configuration the engine was built from.
    pub fn prepare(&mut self, dataset: &Dataset) -> Result<(), PreparationError> {
        let shape = dataset.shape();
        if shape.steps != self.steps {
            return Err(PreparationError::StepMismatch {
                expected: self.steps,
                found: shape.steps,
            });
        }
        if shape.nodes() != self.topology.len() {
            return Err(PreparationError::NodeMismatch {
                expected: self.topology.len(),
                found: shape.nodes(),
            });
        }
        for (node, (expected, found)) in self.topology.kinds().into_iter().zip(&shape.kinds).enumerate() {
            if expected != *found {
                return Err(PreparationError::KindMismatch {
                    node,
                    expected,
                    found: *found,
                });
            }
        }
        if (shape.dt_seconds - self.dt_seconds).abs() > 1e-9 {
            return Err(PreparationError::TimeStepMismatch {
                expected: self.dt_seconds,
                found: shape.dt_seconds,
            });
        }

        for (id, node) in self.topology.nodes().iter().enumerate() {
            self.energy_per_mm3[id] = match node {
                Node::PowerStation(station) => {
                    let intake = self
                        .topology
                        .feeder(id)
                        .and_then(|f| self.topology.node(f))
                        .and_then(Node::as_reservoir)
                        .map_or(station.outlet_masl, |r| r.mean_masl());
                    station.energy_per_mm3(intake)
                }
                _ => 0.0,
            };
        }

        self.shape = Some(shape);
        self.outcome = None;
        self.state = EngineState::Prepared;
        info!(
            steps = self.steps,
            nodes = self.topology.len(),
            dt_seconds = self.dt_seconds,
            "engine prepared"
        );
        Ok(())
    }

    /// Simulates the full horizon and writes the outputs into `dataset`.
    ///
    /// Node states restart from the dataset's initial levels on every
    /// call, so repeated runs over unchanged inputs give identical results.
    ///
    /// # Errors
    ///
    /// `InvalidState` before `prepare`, `Preparation(ShapeChanged)` if the
    /// dataset no longer matches the prepared shape.
    pub fn run(&mut self, dataset: &mut Dataset) -> Result<RunSummary, SimError> {
        if self.state == EngineState::Unprepared {
            return Err(SimError::InvalidState {
                operation: "run",
                state: self.state,
            });
        }
        if self.shape.as_ref() != Some(&dataset.shape()) {
            return Err(PreparationError::ShapeChanged.into());
        }
        info!(steps = self.steps, rest_price = dataset.rest_price(), "run started");

        self.reset(dataset)?;
        dataset.clear_outputs();

        let n = self.topology.len();
        let start: Vec<f64> = self.topology.nodes().iter().map(HydroNode::storage_mm3).collect();
        let mut acc = Accumulator {
            income: vec![0.0; n],
            cost: vec![0.0; n],
            power: vec![Vec::with_capacity(self.steps); n],
            balance: BalanceTracker::new(start),
            production_mwh: 0.0,
            spill_mm3: 0.0,
            shortage_count: 0,
            routed: vec![0.0; n],
            feeds: vec![None; n],
        };

        let start_time = dataset.calendar().first().copied().unwrap_or_default();
        for tick in Clock::new(start_time, self.dt_seconds, self.steps) {
            self.step(tick, dataset, &mut acc)?;
        }

        for (id, node) in self.topology.nodes().iter().enumerate() {
            if let Node::PowerStation(station) = node {
                acc.cost[id] += station.adjustment_cost(&acc.power[id], self.steps_per_day);
            }
        }

        let end: Vec<f64> = self.topology.nodes().iter().map(HydroNode::storage_mm3).collect();
        let balance = acc.balance.finish(&end);
        if !balance.is_closed() {
            warn!(
                error_mm3 = balance.max_error(),
                "water balance does not close"
            );
        }

        let remaining: Vec<f64> = self.topology.nodes().iter().map(HydroNode::remaining_mm3).collect();
        let income: f64 = acc.income.iter().sum();
        let cost: f64 = acc.cost.iter().sum();
        let value = ValueFunction::from_run(
            &self.topology,
            income - cost,
            remaining,
            &self.energy_per_mm3,
        );
        let rest_price = dataset.rest_price();
        dataset.set_residual_price(rest_price);

        let summary = RunSummary {
            steps: self.steps,
            production_mwh: acc.production_mwh,
            income,
            cost,
            spill_mm3: acc.spill_mm3,
            shortage_count: acc.shortage_count,
            residual_price: rest_price,
            terminal_value: value.remaining_mwh * rest_price,
            balance,
        };
        info!(
            production_mwh = summary.production_mwh,
            income = summary.income,
            cost = summary.cost,
            shortages = summary.shortage_count,
            "run finished"
        );

        self.outcome = Some(RunOutcome {
            income: acc.income,
            cost: acc.cost,
            summary: summary.clone(),
            value,
        });
        self.state = EngineState::Ran;
        Ok(summary)
    }

    /// Value snapshot of the last run.
    ///
    /// # Errors
    ///
    /// Returns `NotReadyError` until a run has completed since the last `prepare`.
    pub fn value_function(&self) -> Result<&ValueFunction, NotReadyError> {
        self.outcome.as_ref().map(|o| &o.value).ok_or(NotReadyError)
    }

    /// Value of the last run with remaining water priced at `price`.
    ///
    /// # Errors
    ///
    /// Returns `NotReadyError` until a run has completed since the last `prepare`.
    pub fn calc_value_function(&self, price: f64) -> Result<f64, NotReadyError> {
        Ok(self.value_function()?.value_at(price))
    }

    fn reset(&mut self, dataset: &Dataset) -> Result<(), SimError> {
        let dt = self.dt_seconds;
        for id in 0..self.topology.len() {
            let level = dataset.initial_level(id)?;
            match self.topology.node_mut(id) {
                Some(Node::Reservoir(res)) => {
                    let clamped = level.clamp(res.min_fraction, res.max_fraction);
                    if clamped != level {
                        warn!(node = id, level, clamped, "initial level clamped");
                    }
                    res.reset(clamped);
                }
                Some(Node::PowerStation(station)) => station.reset(),
                Some(Node::Junction(junction)) => junction.reset(dt),
                None => {}
            }
        }
        Ok(())
    }

    /// Action for `(id, t)`: the dataset's request, else the policy's.
    fn resolve_action(
        &self,
        id: NodeId,
        tick: Tick,
        price: f64,
        dataset: &Dataset,
    ) -> Result<f64, SimError> {
        let action = match dataset.requested_action(id, tick.step)? {
            Some(a) => a,
            None => {
                let node = self
                    .topology
                    .node(id)
                    .ok_or(IndexError::Node {
                        node: id,
                        count: self.topology.len(),
                    })?;
                let ctx = PolicyContext {
                    node,
                    t: tick.step,
                    time: tick.time,
                    price,
                    rest_price: dataset.rest_price(),
                };
                let a = self.policy.action(&ctx);
                debug!(node = id, t = tick.step, action = a, "policy action");
                a
            }
        };
        Ok(if action.is_finite() { action.clamp(0.0, 1.0) } else { 0.0 })
    }

    fn tunnel_plan(
        &self,
        id: NodeId,
        tick: Tick,
        price: f64,
        dataset: &Dataset,
    ) -> Result<Option<TunnelPlan>, SimError> {
        let Some(station) = self
            .topology
            .node(id)
            .and_then(Node::as_reservoir)
            .and_then(|r| r.tunnel)
        else {
            return Ok(None);
        };
        let action = self.resolve_action(station, tick, price, dataset)?;
        let request_m3s = self
            .topology
            .node(station)
            .and_then(Node::as_power_station)
            .map_or(0.0, |p| p.requested_flow(action));
        Ok(Some(TunnelPlan {
            station,
            action,
            request_m3s,
        }))
    }

    /// Advances every node by one step in calculation order.
    fn step(&mut self, tick: Tick, dataset: &mut Dataset, acc: &mut Accumulator) -> Result<(), SimError> {
        let t = tick.step;
        let dt = self.dt_seconds;
        let price = dataset.price(t)?;
        let n = self.topology.len();
        acc.routed.fill(0.0);
        acc.feeds.fill(None);

        for k in 0..n {
            let id = self.topology.order()[k];
            let local = dataset.inflow(t, id)?;
            let inflow = local + acc.routed[id];
            acc.balance.add_local(m3s_to_mm3(local, dt));
            acc.balance.add_inflow(id, m3s_to_mm3(inflow, dt));

            let is_reservoir = self.topology.kind(id) == Some(NodeKind::Reservoir);
            let hatch_action = if is_reservoir {
                self.resolve_action(id, tick, price, dataset)?
            } else {
                0.0
            };
            let tunnel = self.tunnel_plan(id, tick, price, dataset)?;
            let feed = acc.feeds[id].unwrap_or_default();

            let stepped = match self.topology.node_mut(id) {
                Some(Node::Reservoir(res)) => {
                    let min_required = res
                        .min_release
                        .as_ref()
                        .and_then(|m| m.schedule.requirement(&tick.time));
                    let input = ReservoirInput {
                        inflow_m3s: inflow,
                        tunnel_request_m3s: tunnel.map_or(0.0, |p| p.request_m3s),
                        hatch_action,
                        min_release_m3s: min_required.map_or(0.0, |r| r.flow_m3s),
                    };
                    Stepped::Reservoir {
                        out: res.step(&input, dt),
                        min_required,
                    }
                }
                Some(Node::PowerStation(station)) => {
                    let turbine_m3s = acc.routed[id];
                    Stepped::Station {
                        out: station.step(turbine_m3s, feed.start_masl, feed.end_masl, price, dt),
                        turbine_m3s,
                    }
                }
                Some(Node::Junction(junction)) => {
                    Stepped::Junction(junction.step(inflow, &tick.time, dt))
                }
                None => return Err(IndexError::Node { node: id, count: n }.into()),
            };

            let record = match stepped {
                Stepped::Reservoir { out, min_required } => {
                    let mut penalty = out.penalty;
                    if let Some(req) = min_required {
                        if out.min_release_m3s < req.flow_m3s {
                            penalty += req.penalty_per_hour * dt / SECONDS_PER_HOUR;
                        }
                    }
                    acc.cost[id] += penalty;

                    let Some(Node::Reservoir(res)) = self.topology.node(id) else {
                        return Err(IndexError::Node { node: id, count: n }.into());
                    };
                    if let Some(plan) = tunnel {
                        route(&mut acc.routed, &mut acc.balance, Some(plan.station), out.tunnel_m3s, dt);
                        let action = if out.tunnel_shortage {
                            self.topology
                                .node(plan.station)
                                .and_then(Node::as_power_station)
                                .map_or(0.0, |p| p.action_for_flow(out.tunnel_m3s))
                        } else {
                            plan.action
                        };
                        acc.feeds[plan.station] = Some(Feed {
                            start_masl: out.start_masl,
                            end_masl: out.end_masl,
                            action,
                            shortage: out.tunnel_shortage,
                        });
                    }
                    let hatch_to = res.hatch.as_ref().and_then(|h| h.to);
                    let release_to = res.min_release.as_ref().and_then(|m| m.to);
                    route(&mut acc.routed, &mut acc.balance, hatch_to, out.hatch_m3s, dt);
                    route(&mut acc.routed, &mut acc.balance, release_to, out.min_release_m3s, dt);
                    route(&mut acc.routed, &mut acc.balance, res.spill_to, out.spill_m3s, dt);

                    if out.shortage {
                        debug!(node = id, t, tunnel_m3s = out.tunnel_m3s, "reservoir shortage");
                    }
                    if out.spill_m3s > 0.0 {
                        debug!(node = id, t, spill_m3s = out.spill_m3s, "reservoir spill");
                    }
                    acc.spill_mm3 += m3s_to_mm3(out.spill_m3s, dt);
                    NodeStep {
                        level: out.fraction,
                        action: if res.hatch.is_some() { out.hatch_action } else { 0.0 },
                        outflow_m3s: out.total_release_m3s(),
                        spill_m3s: out.spill_m3s,
                        production_mwh: 0.0,
                        shortage: out.shortage,
                    }
                }
                Stepped::Station { out, turbine_m3s } => {
                    let downstream = self
                        .topology
                        .node(id)
                        .and_then(Node::as_power_station)
                        .and_then(|p| p.downstream);
                    let outflow = turbine_m3s + local;
                    route(&mut acc.routed, &mut acc.balance, downstream, outflow, dt);
                    acc.income[id] += out.income;
                    acc.cost[id] += out.start_stop_cost;
                    acc.power[id].push(out.power_mw);
                    acc.production_mwh += out.energy_mwh;
                    NodeStep {
                        level: 0.0,
                        action: feed.action,
                        outflow_m3s: outflow,
                        spill_m3s: 0.0,
                        production_mwh: out.energy_mwh,
                        shortage: feed.shortage,
                    }
                }
                Stepped::Junction(out) => {
                    let downstream = match self.topology.node(id) {
                        Some(Node::Junction(j)) => j.downstream,
                        _ => None,
                    };
                    route(&mut acc.routed, &mut acc.balance, downstream, out.outflow_m3s, dt);
                    acc.cost[id] += out.penalty;
                    let shortage = out.outflow_m3s < out.required_m3s;
                    if shortage {
                        debug!(
                            node = id,
                            t,
                            outflow_m3s = out.outflow_m3s,
                            required_m3s = out.required_m3s,
                            "flow requirement not met"
                        );
                    }
                    NodeStep {
                        outflow_m3s: out.outflow_m3s,
                        shortage,
                        ..NodeStep::default()
                    }
                }
            };

            acc.balance.add_outflow(id, m3s_to_mm3(record.outflow_m3s, dt));
            if record.shortage {
                acc.shortage_count += 1;
            }
            dataset.record(id, t, &record);
        }
        Ok(())
    }
}

/// Sends `flow_m3s` to `to`, or out of the system when there is no receiver.
fn route(routed: &mut [f64], balance: &mut BalanceTracker, to: Option<NodeId>, flow_m3s: f64, dt: f64) {
    if flow_m3s <= 0.0 {
        return;
    }
    match to {
        Some(node) => routed[node] += flow_m3s,
        None => balance.add_leaving(m3s_to_mm3(flow_m3s, dt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, JunctionConfig, NodeConfig};
    use crate::sim::policy::ConstantPolicy;

    fn mini(steps: usize) -> (SystemConfig, Dataset) {
        let mut cfg = SystemConfig::mini();
        cfg.simulation.steps = steps;
        let data = Dataset::new(&cfg);
        (cfg, data)
    }

    #[test]
    fn invalid_horizon_is_rejected_at_construction() {
        let (mut cfg, _) = mini(0);
        assert!(matches!(
            Engine::new(&cfg),
            Err(SimError::Config(ConfigError { ref field, .. })) if field == "simulation.steps"
        ));
        cfg.simulation.steps = 4;
        cfg.simulation.dt_seconds = 0.0;
        assert!(matches!(
            Engine::with_policy(&cfg, ConstantPolicy(0.5)),
            Err(SimError::Config(ConfigError { ref field, .. })) if field == "simulation.dt_seconds"
        ));
    }

    #[test]
    fn run_requires_prepare() {
        let (cfg, mut data) = mini(3);
        let mut engine = Engine::new(&cfg).unwrap();
        assert!(matches!(
            engine.run(&mut data),
            Err(SimError::InvalidState {
                state: EngineState::Unprepared,
                ..
            })
        ));
        assert_eq!(engine.calc_value_function(10.0), Err(NotReadyError));
    }

    #[test]
    fn prepare_rejects_wrong_horizon() {
        let (cfg, _) = mini(3);
        let (_, other) = mini(4);
        let mut engine = Engine::new(&cfg).unwrap();
        assert_eq!(
            engine.prepare(&other),
            Err(PreparationError::StepMismatch {
                expected: 3,
                found: 4
            })
        );
        assert_eq!(engine.state(), EngineState::Unprepared);
    }

    #[test]
    fn prepare_rejects_wrong_kinds() {
        let cfg = SystemConfig::mini();
        let mut other = cfg.clone();
        other.nodes[1] = NodeConfig::Junction(JunctionConfig {
            id: 1,
            ..JunctionConfig::default()
        });
        let mut engine = Engine::new(&cfg).unwrap();
        assert!(matches!(
            engine.prepare(&Dataset::new(&other)),
            Err(PreparationError::KindMismatch {
                node: 1,
                expected: NodeKind::PowerStation,
                found: NodeKind::Junction,
            })
        ));
        assert!(engine.prepare(&Dataset::new(&cfg)).is_ok());
    }

    #[test]
    fn caches_energy_equivalent() {
        let (cfg, data) = mini(3);
        let mut engine = Engine::new(&cfg).unwrap();
        engine.prepare(&data).unwrap();
        let e = engine.energy_per_mm3(1).unwrap();
        // 210 m gross head at 92 % best efficiency and 97 % generator
        let expected = 9.80665 * 210.0 * 0.92 * 0.97 / 3600.0 * 1000.0;
        assert!((e - expected).abs() < 1e-9);
        assert_eq!(engine.energy_per_mm3(0), None);
    }

    #[test]
    fn station_releases_and_produces() {
        let (cfg, mut data) = mini(3);
        let mut engine = Engine::with_policy(&cfg, ConstantPolicy(1.0)).unwrap();
        engine.prepare(&data).unwrap();
        let summary = engine.run(&mut data).unwrap();

        assert!(summary.production_mwh > 0.0);
        assert!(data.level(0, 2).unwrap() < data.level(0, 0).unwrap());
        assert_eq!(data.outflow(0, 0), Ok(20.0));
        assert_eq!(data.action(1, 0), Ok(1.0));
        assert!(summary.balance.is_closed(), "{:?}", summary.balance);
        assert_eq!(data.residual_price(), Some(30.0));
        assert_eq!(engine.state(), EngineState::Ran);
    }

    #[test]
    fn routed_flow_does_not_carry_into_next_step() {
        let (cfg, mut data) = mini(3);
        data.set_action(1, 0, 1.0).unwrap();
        data.set_action(1, 1, 0.0).unwrap();
        let mut engine = Engine::with_policy(&cfg, ConstantPolicy(1.0)).unwrap();
        engine.prepare(&data).unwrap();
        engine.run(&mut data).unwrap();

        assert_eq!(data.outflow(1, 0), Ok(20.0));
        assert_eq!(data.outflow(1, 1), Ok(0.0));
        assert_eq!(data.production(1, 1), Ok(0.0));
        assert_eq!(data.outflow(1, 2), Ok(20.0));
    }

    #[test]
    fn low_price_keeps_water() {
        let (cfg, mut data) = mini(4);
        let mut engine = Engine::new(&cfg).unwrap();
        engine.prepare(&data).unwrap();
        let summary = engine.run(&mut data).unwrap();
        // Prices are zero, below the rest price: nothing runs.
        assert_eq!(summary.production_mwh, 0.0);
        assert_eq!(data.level(0, 3), Ok(0.5));
        let vf = engine.value_function().unwrap();
        assert!(vf.remaining_mwh > 0.0);
    }

    #[test]
    fn shape_change_after_prepare_is_rejected() {
        let (cfg, data) = mini(3);
        let mut engine = Engine::new(&cfg).unwrap();
        engine.prepare(&data).unwrap();
        let mut finer = {
            let mut c = cfg.clone();
            c.simulation.dt_seconds = 1800.0;
            Dataset::new(&c)
        };
        assert!(matches!(
            engine.run(&mut finer),
            Err(SimError::Preparation(PreparationError::ShapeChanged))
        ));
    }

    #[test]
    fn cascade_closes_balance() {
        let cfg = SystemConfig::cascade();
        let mut data = Dataset::new(&cfg);
        for t in 0..cfg.horizon() {
            data.set_price(t, if t % 24 < 12 { 20.0 } else { 60.0 }, 30.0).unwrap();
            data.set_inflow(t, 0, 6.0).unwrap();
            data.set_inflow(t, 2, 1.0).unwrap();
        }
        let mut engine = Engine::new(&cfg).unwrap();
        engine.prepare(&data).unwrap();
        let summary = engine.run(&mut data).unwrap();
        assert!(summary.balance.is_closed(), "{:?}", summary.balance);
        for t in 0..cfg.horizon() {
            for node in [0, 2] {
                let level = data.level(node, t).unwrap();
                assert!((-0.05..=1.0).contains(&level), "node {node} t {t}: {level}");
            }
        }
    }
}
