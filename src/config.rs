//! TOML-based river system configuration and preset definitions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

pub use crate::error::ConfigError;
use crate::io::series;
use crate::nodes::{Node, NodeKind};
use crate::topology::Topology;

/// Top-level river system configuration parsed from TOML.
///
/// Load with [`SystemConfig::load`] (parse plus structural validation) or
/// start from a preset such as [`SystemConfig::mini`]. Cross-field checks
/// live in [`SystemConfig::diagnose`] so callers can adjust fields between
/// loading and validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Horizon, time step, and calendar.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Terminal price and other economic parameters.
    #[serde(default)]
    pub economy: EconomyConfig,
    /// Node definitions, one `[[node]]` table each.
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
    #[serde(skip)]
    resolved: Option<ResolvedPaths>,
}

/// Horizon, time step, and calendar.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// System name used in log output.
    pub name: String,
    /// Number of time steps in the horizon (must be > 0).
    pub steps: usize,
    /// Length of one time step in seconds (must be > 0).
    pub dt_seconds: f64,
    /// Timestamp of step 0.
    pub start: NaiveDateTime,
    /// Declared number of reservoir nodes.
    pub reservoirs: usize,
    /// Seed for synthetic series.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "river".to_string(),
            steps: 24,
            dt_seconds: 3600.0,
            start: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            reservoirs: 0,
            seed: 42,
        }
    }
}

/// Input and output locations. Empty file names mean "not used".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub price_file: String,
    pub inflow_file: String,
    pub action_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: ".".to_string(),
            output_dir: "output".to_string(),
            price_file: String::new(),
            inflow_file: String::new(),
            action_file: String::new(),
        }
    }
}

/// Economic parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomyConfig {
    /// Price applied to water left in storage after the horizon.
    pub rest_price: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self { rest_price: 30.0 }
    }
}

/// File locations with directories applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub price_file: Option<PathBuf>,
    pub inflow_file: Option<PathBuf>,
    pub action_file: Option<PathBuf>,
}

impl ResolvedPaths {
    /// All configured series files, labelled by their config field.
    pub fn series_files(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        [
            ("paths.price_file", &self.price_file),
            ("paths.inflow_file", &self.inflow_file),
            ("paths.action_file", &self.action_file),
        ]
        .into_iter()
        .filter_map(|(field, path)| path.as_deref().map(|p| (field, p)))
    }
}

/// One `[[node]]` table, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    Reservoir(ReservoirConfig),
    PowerStation(PowerStationConfig),
    Junction(JunctionConfig),
}

impl NodeConfig {
    pub fn id(&self) -> usize {
        match self {
            NodeConfig::Reservoir(c) => c.id,
            NodeConfig::PowerStation(c) => c.id,
            NodeConfig::Junction(c) => c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NodeConfig::Reservoir(c) => &c.name,
            NodeConfig::PowerStation(c) => &c.name,
            NodeConfig::Junction(c) => &c.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Reservoir(_) => NodeKind::Reservoir,
            NodeConfig::PowerStation(_) => NodeKind::PowerStation,
            NodeConfig::Junction(_) => NodeKind::Junction,
        }
    }

    /// Outgoing references as `(link name, target id)`.
    pub fn references(&self) -> Vec<(&'static str, usize)> {
        let mut refs = Vec::new();
        match self {
            NodeConfig::Reservoir(c) => {
                refs.extend(c.tunnel.map(|to| ("tunnel", to)));
                refs.extend(c.hatch.as_ref().and_then(|h| h.to).map(|to| ("hatch", to)));
                refs.extend(
                    c.min_release
                        .as_ref()
                        .and_then(|m| m.to)
                        .map(|to| ("min_release", to)),
                );
                refs.extend(c.spill_to.map(|to| ("spill", to)));
            }
            NodeConfig::PowerStation(c) => refs.extend(c.downstream.map(|to| ("downstream", to))),
            NodeConfig::Junction(c) => refs.extend(c.downstream.map(|to| ("downstream", to))),
        }
        refs
    }
}

/// Reservoir parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReservoirConfig {
    pub id: usize,
    pub name: String,
    /// Lowest regulated water level (masl).
    pub lrw_masl: f64,
    /// Highest regulated water level (masl).
    pub hrw_masl: f64,
    /// Storage table, `[masl, Mm³]` pairs strictly increasing in both.
    pub volume_curve: Vec<[f64; 2]>,
    /// Level fraction at step 0.
    pub initial_fraction: f64,
    /// Lowest allowed level fraction (may be negative to draw below LRW).
    pub min_fraction: f64,
    /// Highest allowed level fraction; excess water is spilled.
    pub max_fraction: f64,
    /// Power station fed by the intake tunnel.
    pub tunnel: Option<usize>,
    pub hatch: Option<HatchConfig>,
    pub min_release: Option<MinReleaseConfig>,
    /// Overflow table, `[masl, m³/s]`; empty means spill only above `max_fraction`.
    pub overflow_curve: Vec<[f64; 2]>,
    /// Receiver of overflow and forced spill; `None` leaves the system.
    pub spill_to: Option<usize>,
    /// Penalty per hour spent below LRW.
    pub lrw_penalty_per_hour: f64,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            lrw_masl: 0.0,
            hrw_masl: 0.0,
            volume_curve: Vec::new(),
            initial_fraction: 0.5,
            min_fraction: 0.0,
            max_fraction: 1.0,
            tunnel: None,
            hatch: None,
            min_release: None,
            overflow_curve: Vec::new(),
            spill_to: None,
            lrw_penalty_per_hour: 0.0,
        }
    }
}

/// Bottom outlet driven by the reservoir's action.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HatchConfig {
    pub to: Option<usize>,
    /// Flow at action 0 (m³/s).
    pub min_flow_m3s: f64,
    /// Flow at action 1 (m³/s).
    pub max_flow_m3s: f64,
    /// Level below which the hatch runs dry (masl).
    pub sill_masl: f64,
}

/// Mandatory seasonal release through a dedicated outlet.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinReleaseConfig {
    pub to: Option<usize>,
    pub periods: Vec<FlowPeriodConfig>,
}

/// One seasonal period, inclusive `DD.MM` bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowPeriodConfig {
    pub start: String,
    pub end: String,
    pub flow_m3s: f64,
    #[serde(default)]
    pub penalty_per_hour: f64,
}

/// Power station parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerStationConfig {
    pub id: usize,
    pub name: String,
    pub downstream: Option<usize>,
    /// Tailwater level (masl).
    pub outlet_masl: f64,
    /// Turbine flow at the lowest non-zero action (m³/s).
    pub min_discharge_m3s: f64,
    /// Turbine flow at action 1 (m³/s).
    pub max_discharge_m3s: f64,
    /// Mandatory flow through the station regardless of action (m³/s).
    pub min_flow_m3s: f64,
    /// Turbine efficiency table, `[m³/s, %]`.
    pub turbine_curve: Vec<[f64; 2]>,
    pub generator_efficiency: f64,
    /// Head loss coefficient `k` in `k * Q²` (m per (m³/s)²).
    pub head_loss_coef: f64,
    /// Cost of a full start/stop cycle.
    pub start_stop_cost: f64,
    /// kWh per m³; derived from head and best efficiency when absent.
    pub energy_equivalent_kwh_m3: Option<f64>,
    /// Output before step 0 (MW).
    pub initial_power_mw: f64,
    pub max_adjustments: Option<AdjustmentConfig>,
}

impl Default for PowerStationConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            downstream: None,
            outlet_masl: 0.0,
            min_discharge_m3s: 0.0,
            max_discharge_m3s: 0.0,
            min_flow_m3s: 0.0,
            turbine_curve: Vec::new(),
            generator_efficiency: 0.97,
            head_loss_coef: 0.0,
            start_stop_cost: 0.0,
            energy_equivalent_kwh_m3: None,
            initial_power_mw: 0.0,
            max_adjustments: None,
        }
    }
}

/// Daily limit on output changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustmentConfig {
    pub per_day: usize,
    pub cost: f64,
}

/// Junction parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JunctionConfig {
    pub id: usize,
    pub name: String,
    pub downstream: Option<usize>,
    /// Routing lag in steps; 0 passes flow straight through.
    pub travel_time_steps: usize,
    /// Share of each routing cell passed on per step (0, 1].
    pub decay: f64,
    /// Steady flow filling the routing cells at step 0 (m³/s).
    pub initial_flow_m3s: f64,
    pub requirements: Vec<FlowPeriodConfig>,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            downstream: None,
            travel_time_steps: 0,
            decay: 1.0,
            initial_flow_m3s: 0.0,
            requirements: Vec::new(),
        }
    }
}

impl Default for SystemConfig {
    /// Default sections and an empty node list.
    fn default() -> Self {
        Self::new(
            SimulationConfig::default(),
            PathsConfig::default(),
            EconomyConfig::default(),
            Vec::new(),
        )
    }
}

impl SystemConfig {
    /// Builds a configuration from sections and nodes.
    pub fn new(
        simulation: SimulationConfig,
        paths: PathsConfig,
        economy: EconomyConfig,
        nodes: Vec<NodeConfig>,
    ) -> Self {
        Self {
            simulation,
            paths,
            economy,
            nodes,
            resolved: None,
        }
    }

    /// One reservoir feeding one power station whose outflow leaves the system.
    pub fn mini() -> Self {
        Self::new(
            SimulationConfig {
                name: "mini".to_string(),
                reservoirs: 1,
                ..SimulationConfig::default()
            },
            PathsConfig::default(),
            EconomyConfig::default(),
            vec![
                NodeConfig::Reservoir(ReservoirConfig {
                    id: 0,
                    name: "Upper".to_string(),
                    lrw_masl: 500.0,
                    hrw_masl: 520.0,
                    volume_curve: vec![
                        [495.0, 0.0],
                        [500.0, 2.0],
                        [510.0, 12.0],
                        [520.0, 25.0],
                        [525.0, 32.0],
                    ],
                    initial_fraction: 0.5,
                    tunnel: Some(1),
                    overflow_curve: vec![[520.0, 0.0], [521.0, 50.0], [523.0, 300.0]],
                    ..ReservoirConfig::default()
                }),
                NodeConfig::PowerStation(PowerStationConfig {
                    id: 1,
                    name: "Upper PS".to_string(),
                    outlet_masl: 300.0,
                    min_discharge_m3s: 2.0,
                    max_discharge_m3s: 20.0,
                    turbine_curve: vec![
                        [0.0, 0.0],
                        [5.0, 80.0],
                        [15.0, 92.0],
                        [20.0, 90.0],
                        [25.0, 85.0],
                    ],
                    head_loss_coef: 0.01,
                    start_stop_cost: 500.0,
                    ..PowerStationConfig::default()
                }),
            ],
        )
    }

    /// Two reservoirs in series with a routed bypass and a regulated outlet.
    ///
    /// Node ids are deliberately not in calculation order: the bypass
    /// junction (3) must run before the lower reservoir (2).
    pub fn cascade() -> Self {
        let mut cfg = Self::mini();
        cfg.simulation.name = "cascade".to_string();
        cfg.simulation.reservoirs = 2;
        cfg.simulation.steps = 48;
        if let Some(NodeConfig::Reservoir(upper)) = cfg.nodes.get_mut(0) {
            upper.hatch = Some(HatchConfig {
                to: Some(3),
                min_flow_m3s: 0.5,
                max_flow_m3s: 10.0,
                sill_masl: 502.0,
            });
            upper.spill_to = Some(3);
        }
        if let Some(NodeConfig::PowerStation(upper_ps)) = cfg.nodes.get_mut(1) {
            upper_ps.downstream = Some(2);
            upper_ps.outlet_masl = 330.0;
            upper_ps.max_adjustments = Some(AdjustmentConfig {
                per_day: 4,
                cost: 2000.0,
            });
        }
        cfg.nodes.extend([
            NodeConfig::Reservoir(ReservoirConfig {
                id: 2,
                name: "Lower".to_string(),
                lrw_masl: 310.0,
                hrw_masl: 325.0,
                volume_curve: vec![[305.0, 0.0], [310.0, 1.0], [325.0, 9.0], [330.0, 13.0]],
                initial_fraction: 0.4,
                min_fraction: -0.05,
                lrw_penalty_per_hour: 1000.0,
                tunnel: Some(4),
                min_release: Some(MinReleaseConfig {
                    to: Some(5),
                    periods: vec![FlowPeriodConfig {
                        start: "01.05".to_string(),
                        end: "30.09".to_string(),
                        flow_m3s: 1.5,
                        penalty_per_hour: 0.0,
                    }],
                }),
                overflow_curve: vec![[325.0, 0.0], [326.0, 40.0], [328.0, 200.0]],
                spill_to: Some(5),
                ..ReservoirConfig::default()
            }),
            NodeConfig::Junction(JunctionConfig {
                id: 3,
                name: "Bypass".to_string(),
                downstream: Some(2),
                travel_time_steps: 2,
                decay: 0.8,
                initial_flow_m3s: 0.5,
                ..JunctionConfig::default()
            }),
            NodeConfig::PowerStation(PowerStationConfig {
                id: 4,
                name: "Lower PS".to_string(),
                downstream: Some(5),
                outlet_masl: 120.0,
                min_discharge_m3s: 5.0,
                max_discharge_m3s: 35.0,
                min_flow_m3s: 1.0,
                turbine_curve: vec![[0.0, 0.0], [10.0, 85.0], [25.0, 93.0], [35.0, 91.0]],
                generator_efficiency: 0.98,
                head_loss_coef: 0.002,
                start_stop_cost: 800.0,
                energy_equivalent_kwh_m3: Some(0.45),
                ..PowerStationConfig::default()
            }),
            NodeConfig::Junction(JunctionConfig {
                id: 5,
                name: "Outlet".to_string(),
                requirements: vec![FlowPeriodConfig {
                    start: "01.10".to_string(),
                    end: "30.04".to_string(),
                    flow_m3s: 4.0,
                    penalty_per_hour: 250.0,
                }],
                ..JunctionConfig::default()
            }),
        ]);
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["mini", "cascade"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "mini" => Ok(Self::mini()),
            "cascade" => Ok(Self::cascade()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Reads, parses, and structurally validates a configuration file, then
    /// resolves its file paths.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` from reading, parsing, or [`SystemConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = Self::from_toml_file(path)?;
        if let Some(err) = cfg.validate().into_iter().next() {
            return Err(err);
        }
        cfg.resolve_paths();
        tracing::info!(
            system = %cfg.simulation.name,
            nodes = cfg.nodes.len(),
            steps = cfg.simulation.steps,
            "configuration loaded"
        );
        Ok(cfg)
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Number of time steps in the horizon.
    pub fn horizon(&self) -> usize {
        self.simulation.steps
    }

    /// Number of nodes defined.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node kinds indexed by position in the node list.
    pub fn node_kinds(&self) -> Vec<NodeKind> {
        self.nodes.iter().map(NodeConfig::kind).collect()
    }

    /// Node definitions sorted by id.
    pub fn nodes_by_id(&self) -> Vec<&NodeConfig> {
        let mut nodes: Vec<&NodeConfig> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    /// Checks required fields and single-field constraints.
    ///
    /// Returns an empty vector if every field is individually valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.validate_horizon();
        if self.paths.input_dir.trim().is_empty() {
            errors.push(ConfigError::new("paths.input_dir", "must not be empty"));
        }
        if self.paths.output_dir.trim().is_empty() {
            errors.push(ConfigError::new("paths.output_dir", "must not be empty"));
        }
        if !self.economy.rest_price.is_finite() {
            errors.push(ConfigError::new("economy.rest_price", "must be finite"));
        }
        if self.nodes.is_empty() {
            errors.push(ConfigError::new("node", "at least one node is required"));
        }

        errors
    }

    /// Horizon and time step checks, the part of [`SystemConfig::validate`]
    /// an engine depends on.
    pub fn validate_horizon(&self) -> Vec<ConfigError> {
        let s = &self.simulation;
        let mut errors = Vec::new();
        if s.steps == 0 {
            errors.push(ConfigError::new("simulation.steps", "must be > 0"));
        }
        if !(s.dt_seconds.is_finite() && s.dt_seconds > 0.0) {
            errors.push(ConfigError::new("simulation.dt_seconds", "must be > 0"));
        }
        errors
    }

    /// Cross-field consistency checks.
    ///
    /// Covers declared counts, id layout, references, per-node parameters,
    /// and finally the network structure itself. Returns an empty vector if
    /// the configuration is consistent.
    pub fn diagnose(&self) -> Vec<ConfigError> {
        let mut errors = self.validate();

        let reservoirs = self
            .nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Reservoir)
            .count();
        if reservoirs != self.simulation.reservoirs {
            errors.push(ConfigError::new(
                "simulation.reservoirs",
                format!(
                    "declares {} reservoirs, node list has {reservoirs}",
                    self.simulation.reservoirs
                ),
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id()) {
                errors.push(ConfigError::new(
                    format!("node[{}].id", node.id()),
                    "duplicate id",
                ));
            }
        }
        let count = self.nodes.len();
        for node in &self.nodes {
            let field = format!("node[{}]", node.id());
            if node.id() >= count {
                errors.push(ConfigError::new(
                    format!("{field}.id"),
                    format!("ids must be contiguous in 0..{count}"),
                ));
            }
            for (link, to) in node.references() {
                if !seen.contains(&to) {
                    errors.push(ConfigError::new(
                        format!("{field}.{link}"),
                        format!("refers to unknown node {to}"),
                    ));
                }
            }
            if let Err(reason) = Node::from_config(node) {
                errors.push(ConfigError::new(field, reason));
            }
        }

        if errors.is_empty() {
            if let Err(e) = Topology::build(self) {
                errors.push(ConfigError::new("node", e.to_string()));
            }
        }

        errors
    }

    /// Verifies that every configured series file covers the horizon.
    ///
    /// Uses the stored [`ResolvedPaths`] when present, otherwise derives them
    /// without storing.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first file that cannot be read or
    /// holds fewer rows than `simulation.steps`.
    pub fn check_step_count(&self) -> Result<usize, ConfigError> {
        let derived;
        let paths = match &self.resolved {
            Some(p) => p,
            None => {
                derived = self.derive_paths();
                &derived
            }
        };
        for (field, path) in paths.series_files() {
            let rows = series::count_steps(path).map_err(|e| ConfigError::new(field, e.to_string()))?;
            if rows < self.simulation.steps {
                return Err(ConfigError::new(
                    field,
                    format!(
                        "\"{}\" holds {rows} steps, horizon is {}",
                        path.display(),
                        self.simulation.steps
                    ),
                ));
            }
        }
        Ok(self.simulation.steps)
    }

    /// Joins file names onto their directories without storing the result.
    pub fn derive_paths(&self) -> ResolvedPaths {
        let input_dir = PathBuf::from(&self.paths.input_dir);
        let in_input = |name: &str| {
            let name = name.trim();
            (!name.is_empty()).then(|| input_dir.join(name))
        };
        ResolvedPaths {
            price_file: in_input(&self.paths.price_file),
            inflow_file: in_input(&self.paths.inflow_file),
            action_file: in_input(&self.paths.action_file),
            output_dir: PathBuf::from(&self.paths.output_dir),
            input_dir: input_dir.clone(),
        }
    }

    /// Derives and stores file paths; later edits to [`PathsConfig`] take
    /// effect only after calling this again.
    pub fn resolve_paths(&mut self) -> &ResolvedPaths {
        self.resolved.insert(self.derive_paths())
    }

    /// Paths stored by the last [`SystemConfig::resolve_paths`] call.
    pub fn resolved_paths(&self) -> Option<&ResolvedPaths> {
        self.resolved.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_consistent() {
        for name in SystemConfig::PRESETS {
            let cfg = SystemConfig::from_preset(name).unwrap();
            let errors = cfg.diagnose();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = SystemConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
name = "test"
steps = 5
dt_seconds = 3600.0
start = "2024-06-01T00:00:00"
reservoirs = 1

[paths]
input_dir = "in"
output_dir = "out"
price_file = "price.csv"

[economy]
rest_price = 42.0

[[node]]
kind = "reservoir"
id = 0
name = "Lake"
lrw_masl = 100.0
hrw_masl = 110.0
volume_curve = [[95.0, 0.0], [100.0, 1.0], [110.0, 11.0]]
tunnel = 1

[[node]]
kind = "power_station"
id = 1
name = "Plant"
outlet_masl = 20.0
min_discharge_m3s = 1.0
max_discharge_m3s = 10.0
turbine_curve = [[0.0, 0.0], [10.0, 90.0]]
"#;
        let cfg = SystemConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.steps, 5);
        assert_eq!(cfg.economy.rest_price, 42.0);
        assert_eq!(cfg.node_kinds(), vec![NodeKind::Reservoir, NodeKind::PowerStation]);
        assert!(cfg.diagnose().is_empty(), "{:?}", cfg.diagnose());
    }

    #[test]
    fn unknown_field_rejected() {
        let toml = r#"
[simulation]
steps = 5
bogus = 1
"#;
        let err = SystemConfig::from_toml_str(toml).unwrap_err();
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn unknown_node_kind_rejected() {
        let toml = r#"
[[node]]
kind = "windmill"
id = 0
"#;
        assert!(SystemConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn zero_horizon_is_invalid() {
        let mut cfg = SystemConfig::mini();
        cfg.simulation.steps = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.steps"));
    }

    #[test]
    fn diagnose_catches_reservoir_count() {
        let mut cfg = SystemConfig::mini();
        cfg.simulation.reservoirs = 3;
        let errors = cfg.diagnose();
        assert!(errors.iter().any(|e| e.field == "simulation.reservoirs"));
    }

    #[test]
    fn diagnose_catches_dangling_reference() {
        let mut cfg = SystemConfig::mini();
        if let NodeConfig::PowerStation(ps) = &mut cfg.nodes[1] {
            ps.downstream = Some(9);
        }
        let errors = cfg.diagnose();
        assert!(
            errors.iter().any(|e| e.field == "node[1].downstream"),
            "{errors:?}"
        );
    }

    #[test]
    fn diagnose_catches_bad_curve() {
        let mut cfg = SystemConfig::mini();
        if let NodeConfig::Reservoir(r) = &mut cfg.nodes[0] {
            r.volume_curve = vec![[500.0, 1.0]];
        }
        let errors = cfg.diagnose();
        assert!(errors.iter().any(|e| e.field == "node[0]"), "{errors:?}");
    }

    #[test]
    fn resolved_paths_survive_mutation_until_rederived() {
        let mut cfg = SystemConfig::mini();
        cfg.paths.input_dir = "first".to_string();
        cfg.paths.price_file = "price.csv".to_string();
        cfg.resolve_paths();

        cfg.paths.input_dir = "second".to_string();
        let stored = cfg.resolved_paths().unwrap();
        assert_eq!(stored.price_file, Some(PathBuf::from("first/price.csv")));

        cfg.resolve_paths();
        let stored = cfg.resolved_paths().unwrap();
        assert_eq!(stored.price_file, Some(PathBuf::from("second/price.csv")));
    }

    #[test]
    fn empty_file_names_are_unused() {
        let cfg = SystemConfig::mini();
        let paths = cfg.derive_paths();
        assert_eq!(paths.series_files().count(), 0);
        assert_eq!(cfg.check_step_count(), Ok(24));
    }

    #[test]
    fn missing_series_file_fails_step_check() {
        let mut cfg = SystemConfig::mini();
        cfg.paths.input_dir = "does/not/exist".to_string();
        cfg.paths.inflow_file = "inflow.csv".to_string();
        let err = cfg.check_step_count().unwrap_err();
        assert_eq!(err.field, "paths.inflow_file");
    }
}
