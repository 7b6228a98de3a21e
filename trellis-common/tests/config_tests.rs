//! Tests for configuration resolution
//!
//! Covers:
//! - Priority order: explicit path, TRELLIS_CONFIG, platform file, defaults
//! - Missing optional config files fall back to defaults
//! - Environment overrides for individual fields
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate TRELLIS_* variables are marked with #[serial].

use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;
use trellis_common::config::{
    resolve_config, ACTIVATE_ENV_VAR, CONFIG_ENV_VAR, VIEW_EXTENSION_ENV_VAR,
};
use trellis_common::{CompositionConfig, ConcurrencyPolicy, Error};

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(ACTIVATE_ENV_VAR);
    env::remove_var(VIEW_EXTENSION_ENV_VAR);
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_explicit_path_has_priority() {
    clear_env();
    let env_file = write_config("view_extension = \".env\"\n");
    let cli_file = write_config("view_extension = \".cli\"\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = resolve_config(Some(cli_file.path())).unwrap();
    assert_eq!(config.view_extension, ".cli");

    clear_env();
}

#[test]
#[serial]
fn test_explicit_missing_path_is_error() {
    clear_env();
    let result = resolve_config(Some(std::path::Path::new(
        "/tmp/trellis-definitely-missing/config.toml",
    )));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_config_path() {
    clear_env();
    let file = write_config(
        "activate_during_composition = true\ndefault_area = \"widgets\"\nconcurrency = \"unguarded\"\n",
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = resolve_config(None).unwrap();
    assert!(config.activate_during_composition);
    assert_eq!(config.default_area, "widgets");
    assert_eq!(config.concurrency, ConcurrencyPolicy::Unguarded);

    clear_env();
}

#[test]
#[serial]
fn test_env_config_path_missing_uses_defaults() {
    clear_env();
    env::set_var(CONFIG_ENV_VAR, "/tmp/trellis-definitely-missing/config.toml");

    let config = resolve_config(None).unwrap();
    assert_eq!(config, CompositionConfig::default());

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_apply_after_file() {
    clear_env();
    let file = write_config("activate_during_composition = false\n");
    env::set_var(ACTIVATE_ENV_VAR, "true");
    env::set_var(VIEW_EXTENSION_ENV_VAR, ".view");

    let config = resolve_config(Some(file.path())).unwrap();
    assert!(config.activate_during_composition);
    assert_eq!(config.view_extension, ".view");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_override_is_error() {
    clear_env();
    let file = write_config("");
    env::set_var(ACTIVATE_ENV_VAR, "sometimes");

    let result = resolve_config(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    clear_env();
    let file = write_config("concurrency = \"sideways\"\n");

    let result = resolve_config(Some(file.path()));
    assert!(matches!(result, Err(Error::Toml(_))));
}
