//! Configuration data models
//!
//! This module contains data structures for configuration management:
//! - Publish requests and variant selection
//! - Batch import and sync outcomes
//! - Namespace management

pub mod config;
pub mod namespace;

pub use config::*;
pub use namespace::*;
