//! Configuration management
//!
//! Runtime settings for a node: the starting difficulty and an optional
//! mining reward address, overridable through the environment.

pub mod settings;

pub use settings::{Config, GLOBAL_CONFIG};
