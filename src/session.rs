//! One configuration, one dataset, and one engine behind the call surface
//! used by scripting front ends.
//!
//! A typical sequence:
//!
//! ```no_run
//! use std::path::Path;
//! use river_sim::session::Session;
//!
//! # fn main() -> Result<(), river_sim::error::SimError> {
//! let mut session = Session::load_config(Path::new("scenarios/mini.toml"))?;
//! assert!(session.diagnose().is_empty());
//! session.check_step_count()?;
//! session.build_dataset()?;
//! session.build_engine()?;
//! session.prepare()?;
//! session.run()?;
//!
//! let rest = session.rest_price()?;
//! session.set_price(1, 99.9, rest + 5.0)?;
//! session.run()?;
//! let level = session.get_level(0, 2)?;
//! # let _ = level;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use crate::config::{ConfigError, SystemConfig};
use crate::dataset::Dataset;
use crate::error::SimError;
use crate::sim::engine::Engine;
use crate::sim::types::{EngineState, RunSummary};

/// Stateful facade over [`SystemConfig`], [`Dataset`], and [`Engine`].
///
/// Data accessors are available once the engine is prepared. The
/// configuration may be edited through [`Session::config_mut`] at any
/// time; the dataset and engine only pick edits up when rebuilt.
#[derive(Default)]
pub struct Session {
    config: SystemConfig,
    dataset: Option<Dataset>,
    engine: Option<Engine>,
}

impl Session {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            dataset: None,
            engine: None,
        }
    }

    /// Starts a session from a configuration file.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` from [`SystemConfig::load`].
    pub fn load_config(path: &Path) -> Result<Self, SimError> {
        Ok(Self::new(SystemConfig::load(path)?))
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SystemConfig {
        &mut self.config
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    pub fn state(&self) -> EngineState {
        self.engine.as_ref().map_or(EngineState::Unprepared, Engine::state)
    }

    /// Cross-field configuration checks; empty when consistent.
    pub fn diagnose(&self) -> Vec<ConfigError> {
        self.config.diagnose()
    }

    /// # Errors
    ///
    /// Returns a `ConfigError` naming a series file shorter than the horizon.
    pub fn check_step_count(&self) -> Result<usize, ConfigError> {
        self.config.check_step_count()
    }

    /// Builds the dataset from the configured series files.
    ///
    /// # Errors
    ///
    /// Returns a `SimError` if a series file cannot be read or holds
    /// values the network rejects.
    pub fn build_dataset(&mut self) -> Result<(), SimError> {
        self.dataset = Some(Dataset::from_files(&self.config)?);
        Ok(())
    }

    /// Replaces the dataset, e.g. with one from [`crate::synthetic::generate`].
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.dataset = Some(dataset);
    }

    /// Builds a fresh, unprepared engine from the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Topology` if the nodes do not form a valid network.
    pub fn build_engine(&mut self) -> Result<(), SimError> {
        self.engine = Some(Engine::new(&self.config)?);
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidState` without a dataset and engine, or a
    /// `PreparationError` if they do not match.
    pub fn prepare(&mut self) -> Result<(), SimError> {
        let state = self.state();
        match (&mut self.engine, &self.dataset) {
            (Some(engine), Some(dataset)) => Ok(engine.prepare(dataset)?),
            _ => Err(SimError::InvalidState {
                operation: "prepare",
                state,
            }),
        }
    }

    /// # Errors
    ///
    /// `InvalidState` before `prepare`, plus any error from [`Engine::run`].
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        let state = self.state();
        match (&mut self.engine, &mut self.dataset) {
            (Some(engine), Some(dataset)) => engine.run(dataset),
            _ => Err(SimError::InvalidState {
                operation: "run",
                state,
            }),
        }
    }

    fn data(&self, operation: &'static str) -> Result<&Dataset, SimError> {
        let state = self.state();
        match &self.dataset {
            Some(dataset) if state != EngineState::Unprepared => Ok(dataset),
            _ => Err(SimError::InvalidState { operation, state }),
        }
    }

    fn data_mut(&mut self, operation: &'static str) -> Result<&mut Dataset, SimError> {
        let state = self.state();
        match &mut self.dataset {
            Some(dataset) if state != EngineState::Unprepared => Ok(dataset),
            _ => Err(SimError::InvalidState { operation, state }),
        }
    }

    pub fn get_price(&self, t: usize) -> Result<f64, SimError> {
        Ok(self.data("get_price")?.price(t)?)
    }

    /// Sets the price of step `t` and the terminal rest price together.
    pub fn set_price(&mut self, t: usize, price: f64, rest_price: f64) -> Result<(), SimError> {
        self.data_mut("set_price")?.set_price(t, price, rest_price)
    }

    pub fn rest_price(&self) -> Result<f64, SimError> {
        Ok(self.data("rest_price")?.rest_price())
    }

    /// Rest price applied by the last run.
    pub fn residual_price(&self) -> Result<Option<f64>, SimError> {
        Ok(self.data("residual_price")?.residual_price())
    }

    pub fn get_inflow(&self, t: usize, node: usize) -> Result<f64, SimError> {
        Ok(self.data("get_inflow")?.inflow(t, node)?)
    }

    pub fn set_inflow(&mut self, t: usize, node: usize, value: f64) -> Result<(), SimError> {
        self.data_mut("set_inflow")?.set_inflow(t, node, value)
    }

    pub fn get_initial_level(&self, node: usize) -> Result<f64, SimError> {
        Ok(self.data("get_initial_level")?.initial_level(node)?)
    }

    /// Takes effect on the next run.
    pub fn set_initial_level(&mut self, node: usize, value: f64) -> Result<(), SimError> {
        self.data_mut("set_initial_level")?.set_initial_level(node, value)
    }

    pub fn get_level(&self, node: usize, t: usize) -> Result<f64, SimError> {
        Ok(self.data("get_level")?.level(node, t)?)
    }

    pub fn get_action(&self, node: usize, t: usize) -> Result<f64, SimError> {
        Ok(self.data("get_action")?.action(node, t)?)
    }

    pub fn set_action(&mut self, node: usize, t: usize, value: f64) -> Result<(), SimError> {
        self.data_mut("set_action")?.set_action(node, t, value)
    }

    /// Value of the last run with remaining water priced at `price`.
    ///
    /// # Errors
    ///
    /// `InvalidState` without an engine, `NotReady` before the first run.
    pub fn calc_value_function(&self, price: f64) -> Result<f64, SimError> {
        match &self.engine {
            Some(engine) => Ok(engine.calc_value_function(price)?),
            None => Err(SimError::InvalidState {
                operation: "calc_value_function",
                state: EngineState::Unprepared,
            }),
        }
    }
}
