/// Mass balance bookkeeping.
pub mod balance;
/// Simulation clock for timestep management.
pub mod clock;
pub mod engine;
/// Default dispatch policies.
pub mod policy;
pub mod types;
pub mod value;
