//! The sample configuration shipped at the repository root must stay loadable

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use courier::load_config;

#[test]
fn test_sample_config_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../courier.config.ron");
    let config = load_config(&path).unwrap();

    assert_eq!(config.primary.name, "PrimaryProvider");
    assert_eq!(config.fallback.name, "SecondaryProvider");
    assert_eq!(config.dispatch.rate_limit.count, 5);
    assert_eq!(config.dispatch.rate_limit.window_ms, 60_000);
    assert_eq!(config.messages.len(), 3);
}
