//! Signal database and symbol file loaders
//!
//! This module contains loaders for signal definition files (DBC, and the JSON
//! form produced by DBC converters) and the unified signal database.

pub mod database;
pub mod dbc;
pub mod json;

pub use database::{DatabaseStats, SignalDatabase};
