//! Environment-variable precedence for the configuration builder (spec §2
//! ambient stack: config layer mirrors the teacher's validating builder).

use browser_broker::BrokerConfigBuilder;

#[test]
fn env_vars_seed_fields_and_explicit_overrides_win() {
    // SAFETY (test-only, single-threaded per-test env access): no other
    // test in this binary reads BROKER_DEBUG_PORT / BROKER_MAX_SESSIONS.
    unsafe {
        std::env::set_var("BROKER_DEBUG_PORT", "9444");
        std::env::set_var("BROKER_MAX_SESSIONS", "7");
    }

    let config = BrokerConfigBuilder::from_env()
        .expect("valid env")
        .max_sessions(42)
        .build()
        .expect("valid config");

    assert_eq!(config.debug_port(), 9444);
    assert_eq!(config.max_sessions(), 42);

    unsafe {
        std::env::remove_var("BROKER_DEBUG_PORT");
        std::env::remove_var("BROKER_MAX_SESSIONS");
    }
}

#[test]
fn invalid_env_value_is_rejected() {
    unsafe {
        std::env::set_var("BROKER_DEBUG_PORT", "not-a-port");
    }
    let result = BrokerConfigBuilder::from_env();
    unsafe {
        std::env::remove_var("BROKER_DEBUG_PORT");
    }
    assert!(result.is_err());
}
