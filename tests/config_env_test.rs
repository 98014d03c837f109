//! Tests for environment-driven configuration.
//!
//! Env mutation is process-global, so these run serially.

use serial_test::serial;
use std::env;

use hypothesis_lab::config::{Config, LogFormat};

fn clear_config_env() {
    for key in [
        "DATABASE_PATH",
        "DATABASE_MAX_CONNECTIONS",
        "LOG_LEVEL",
        "LOG_FORMAT",
        "AUTO_COMMIT",
        "AMENDMENT_PENALTY",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_apply_when_env_is_empty() {
    clear_config_env();
    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "./data/sessions.db");
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.session.auto_commit);
    assert_eq!(config.session.amendment_penalty, 15);
}

#[test]
#[serial]
fn env_values_override_defaults() {
    clear_config_env();
    env::set_var("DATABASE_PATH", "/tmp/lab.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "9");
    env::set_var("LOG_LEVEL", "debug");
    env::set_var("LOG_FORMAT", "json");
    env::set_var("AUTO_COMMIT", "false");
    env::set_var("AMENDMENT_PENALTY", "25");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/tmp/lab.db");
    assert_eq!(config.database.max_connections, 9);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(!config.session.auto_commit);
    assert_eq!(config.session.amendment_penalty, 25);

    clear_config_env();
}

#[test]
#[serial]
fn malformed_numbers_fall_back_to_defaults() {
    clear_config_env();
    env::set_var("DATABASE_MAX_CONNECTIONS", "many");
    env::set_var("AMENDMENT_PENALTY", "-3");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.session.amendment_penalty, 15);

    clear_config_env();
}

#[test]
#[serial]
fn amendment_penalty_is_capped_at_100() {
    clear_config_env();
    env::set_var("AMENDMENT_PENALTY", "400");
    let config = Config::from_env().unwrap();
    assert_eq!(config.session.amendment_penalty, 100);
    clear_config_env();
}
