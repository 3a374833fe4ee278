//! Delivery backends the courier binary can drive the engine with

mod simulated;

pub use simulated::{SimulatedBackend, SimulatedBackendConfig};
