//! Time-series input tables.

pub mod series;
