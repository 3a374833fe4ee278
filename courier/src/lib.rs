//! Runs the courier dispatch engine from a RON configuration file, delivering
//! through simulated backends.

pub mod backends;
pub mod config;
pub mod controller;

pub use config::{ConfigError, CourierConfig, find_config_file, load_config};
pub use controller::{Controller, Report};
