//! Test support utilities for dispatch engine tests

pub mod mock_backend;

pub use mock_backend::MockBackend;
