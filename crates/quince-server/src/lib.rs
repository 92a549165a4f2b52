//! Quince server library
//!
//! Configuration loading, logging, database bootstrap and background tasks
//! shared by the `quince-server` binary.

pub mod model;
pub mod startup;

pub use model::{AppState, Configuration};
