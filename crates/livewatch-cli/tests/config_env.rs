//! Environment layering for configuration.
//!
//! These tests mutate the process environment, so they run serially.

use livewatch::Options;
use livewatch_cli::config::{load_in, DEFAULT_CONFIG_FILE};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const VARS: &[&str] = &[
    "LIVEWATCH_PORT",
    "LIVEWATCH_HOST",
    "LIVEWATCH_DELAY",
    "LIVEWATCH_DEBUG",
    "LIVEWATCH_EXTS",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(DEFAULT_CONFIG_FILE),
        r#"{ "port": 4000, "delay": 50 }"#,
    )
    .unwrap();

    std::env::set_var("LIVEWATCH_PORT", "5000");
    std::env::set_var("LIVEWATCH_HOST", "127.0.0.1");
    std::env::set_var("LIVEWATCH_DEBUG", "true");

    let options = load_in(temp.path(), None, Options::default()).unwrap();
    clear_env();

    assert_eq!(options.port, Some(5000));
    assert_eq!(options.host.as_deref(), Some("127.0.0.1"));
    assert_eq!(options.debug, Some(true));
    assert_eq!(options.delay, Some(50));
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    let temp = TempDir::new().unwrap();
    std::env::set_var("LIVEWATCH_DELAY", "75");
    std::env::set_var("LIVEWATCH_PORT", "5000");

    let cli = Options {
        port: Some(6000),
        ..Options::default()
    };
    let options = load_in(temp.path(), None, cli).unwrap();
    clear_env();

    assert_eq!(options.port, Some(6000));
    assert_eq!(options.delay, Some(75));
}

#[test]
#[serial]
fn test_list_options_not_read_from_env() {
    clear_env();
    let temp = TempDir::new().unwrap();
    std::env::set_var("LIVEWATCH_EXTS", "md");

    let options = load_in(temp.path(), None, Options::default()).unwrap();
    clear_env();

    assert!(options.exts.is_empty());
}

#[test]
#[serial]
fn test_loaded_options_normalize() {
    clear_env();
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(DEFAULT_CONFIG_FILE),
        r#"{ "extraExts": ["foobar"], "exclusions": ["node_modules/"], "delay": 0 }"#,
    )
    .unwrap();

    let config = load_in(temp.path(), None, Options::default())
        .unwrap()
        .normalize()
        .unwrap();

    assert_eq!(config.exts.first().map(String::as_str), Some("foobar"));
    assert_eq!(config.exclusions.len(), 4);
    assert!(config.delay.is_none());
}
