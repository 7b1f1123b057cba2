//! Error taxonomy for configuration, topology, dataset access, and runs.

use thiserror::Error;

use crate::nodes::NodeKind;
use crate::sim::types::EngineState;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.steps"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Structural problems found while building the node graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("topology has no nodes")]
    Empty,

    #[error("duplicate node id {0}")]
    DuplicateId(usize),

    #[error("node ids must be contiguous from 0: expected {expected}, found {found}")]
    NonContiguousIds { expected: usize, found: usize },

    #[error("node {from} has a {link} link to unknown node {to}")]
    UnknownNode {
        from: usize,
        to: usize,
        link: &'static str,
    },

    #[error("node {0} links to itself")]
    SelfLoop(usize),

    #[error("cycle detected through nodes {nodes:?}")]
    Cycle { nodes: Vec<usize> },

    #[error("tunnel of reservoir {reservoir} must lead to a power station, node {target} is a {kind}")]
    TunnelTarget {
        reservoir: usize,
        target: usize,
        kind: NodeKind,
    },

    #[error("power station {0} is not fed by any reservoir tunnel")]
    UnfedStation(usize),

    #[error("power station {station} is fed by several tunnels: {feeders:?}")]
    SharedStation { station: usize, feeders: Vec<usize> },

    #[error("invalid parameters on node {node}: {reason}")]
    InvalidNode { node: usize, reason: String },
}

/// Dataset and topology disagree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreparationError {
    #[error("dataset covers {found} steps, configuration expects {expected}")]
    StepMismatch { expected: usize, found: usize },

    #[error("dataset holds {found} nodes, topology has {expected}")]
    NodeMismatch { expected: usize, found: usize },

    #[error("node {node} is a {expected} in the topology but a {found} in the dataset")]
    KindMismatch {
        node: usize,
        expected: NodeKind,
        found: NodeKind,
    },

    #[error("dataset time step is {found} s, configuration expects {expected} s")]
    TimeStepMismatch { expected: f64, found: f64 },

    #[error("dataset shape changed since prepare; call prepare again")]
    ShapeChanged,
}

/// Out-of-range time step or node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("time step {t} out of range (horizon {horizon})")]
    Step { t: usize, horizon: usize },

    #[error("node {node} out of range ({count} nodes)")]
    Node { node: usize, count: usize },
}

/// Value function requested before any completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no completed run; call run() before requesting the value function")]
pub struct NotReadyError;

/// Problems reading a time-series table.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("cannot read \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("\"{path}\" holds {rows} steps, horizon is {steps}")]
    TooShort {
        path: String,
        rows: usize,
        steps: usize,
    },
}

/// Umbrella error returned by engine and session operations.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Preparation(#[from] PreparationError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("invalid {field} {value}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: f64,
        reason: String,
    },

    #[error("node {node} is a {found}, {operation} needs a {expected}")]
    WrongNodeKind {
        node: usize,
        operation: &'static str,
        expected: &'static str,
        found: NodeKind,
    },

    #[error("{operation} not allowed while engine is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },
}
