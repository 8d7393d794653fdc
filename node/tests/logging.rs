//! Global subscriber installation. Kept in its own test binary so the
//! subscriber does not capture output from other tests.

use link_node::{LinkConfig, NodeError};

#[test]
fn config_installs_subscriber_once() {
    let config = LinkConfig {
        log_format: "json".to_string(),
        log_level: "warn".to_string(),
        ..LinkConfig::default()
    };
    config.init_logging().unwrap();

    let err = config.init_logging().unwrap_err();
    assert!(matches!(err, NodeError::Logging(_)));
}
