pub mod common;
pub mod config;
pub mod constants;

pub use common::AppState;
pub use config::Configuration;
