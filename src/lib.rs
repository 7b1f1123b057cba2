//! Hydro river-system simulator.
//!
//! A river system is a network of reservoirs, power stations, and
//! junctions ([`topology`]) described by a TOML [`config`]. Exogenous
//! prices and inflows live in a [`dataset::Dataset`] that the caller owns;
//! the [`sim::engine::Engine`] walks the horizon, writes levels, actions,
//! and production back into it, and values the water left at the end.
//! [`session::Session`] bundles the three behind a flat call surface.

pub mod config;
pub mod dataset;
pub mod error;
/// Time-series input files.
pub mod io;
pub mod nodes;
pub mod session;
/// Simulation engine, clock, dispatch policy, and value function.
pub mod sim;
pub mod synthetic;
pub mod topology;
