use std::path::PathBuf;

use judgebox::config::Config;
use judgebox::{EXAMPLE_CONFIG, Language};

use super::fixture_path;

#[test]
fn test_load_valid_config() {
    let config = Config::from_file(fixture_path("configs/valid_full.toml"))
        .expect("Failed to load config");

    assert_eq!(config.work_dir, PathBuf::from("/tmp/judgebox-fixture"));
    assert_eq!(config.compile_timeout_ms, 15000);
    assert_eq!(config.compile_output_limit_mb, 8);
    assert_eq!(config.sample_interval_ms, 50);
    assert_eq!(config.default_limits.time_limit_ms, Some(2000));
    assert_eq!(config.default_limits.memory_limit_mb, Some(128));
    assert_eq!(
        config.toolchain(Language::Cpp).compile.as_ref().unwrap()[1],
        "-std=c++17"
    );
    assert_eq!(config.toolchain(Language::Java).run[1], "-Xss64m");
    assert_eq!(config.toolchain(Language::Python3).env.len(), 1);
}

#[test]
fn test_load_minimal_config() {
    let config = Config::from_file(fixture_path("configs/valid_minimal.toml"))
        .expect("Failed to load config");

    assert_eq!(config.default_limits.time_limit_ms, Some(1000));
    assert_eq!(config.default_limits.memory_limit_mb(), 64);
    assert_eq!(config.toolchains, judgebox::config::Toolchains::default());
}

#[test]
fn test_load_invalid_empty_run_command() {
    let result = Config::from_file(fixture_path("configs/invalid_empty_run_command.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_zero_time_limit() {
    let result = Config::from_file(fixture_path("configs/invalid_zero_time_limit.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_missing_file() {
    let result = Config::from_file(fixture_path("configs/does_not_exist.toml"));
    assert!(result.is_err());
}

#[test]
fn test_example_config_is_valid() {
    let config = Config::parse_toml(EXAMPLE_CONFIG).expect("Example config should parse");
    for language in Language::ALL {
        assert!(!config.toolchain(language).run.is_empty());
    }
}
