use std::path::{Path, PathBuf};

use dockcube::{Config, ConfigError, Language};

use super::FIXTURES_PATH;

fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES_PATH).join("configs").join(name)
}

#[test]
fn test_load_valid_config() {
    let config = Config::from_file(fixture("valid_full.toml")).expect("Failed to load config");

    assert_eq!(
        config.docker_host.as_deref(),
        Some("unix:///var/run/docker.sock")
    );
    assert_eq!(
        config.workspace_root.as_deref(),
        Some(Path::new("/var/tmp/dockcube"))
    );
    assert_eq!(config.workdir, "/sandbox");
    assert_eq!(config.workers, 8);
    assert_eq!(config.default_timeout, 10);
    assert_eq!(config.keepalive_seconds, 600);
    assert!(config.pull_images);
    assert_eq!(config.limits.memory, 256 * 1024 * 1024);
    assert_eq!(config.limits.cpu_share(), 1.0);

    assert_eq!(config.image_for(Language::Python), "python:3.11-slim");
    assert_eq!(config.image_for(Language::Go), "golang:1.22-alpine");
    // Not overridden
    assert_eq!(config.image_for(Language::Java), "openjdk:21-jdk-slim");
}

#[test]
fn test_load_minimal_config() {
    let config = Config::from_file(fixture("valid_minimal.toml")).expect("Failed to load config");

    assert_eq!(config.workers, 2);
    assert_eq!(config.workdir, "/workspace");
    assert_eq!(config.default_timeout, 30);
    assert_eq!(config.keepalive_seconds, 3600);
    assert!(!config.pull_images);
    assert_eq!(config.limits, Config::default().limits);
}

#[test]
fn test_layered_load_keeps_defaults_for_missing_keys() {
    let config = Config::load(Some(&fixture("valid_minimal.toml"))).expect("Failed to load config");

    assert_eq!(config.workers, 2);
    assert_eq!(config.limits.memory, 512 * 1024 * 1024);
}

#[test]
fn test_load_invalid_zero_workers() {
    let result = Config::from_file(fixture("invalid_zero_workers.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_relative_workdir() {
    let result = Config::from_file(fixture("invalid_relative_workdir.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_empty_image() {
    let result = Config::from_file(fixture("invalid_empty_image.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_unknown_language() {
    let result = Config::from_file(fixture("invalid_unknown_language.toml"));
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_missing_file() {
    let result = Config::from_file(fixture("does_not_exist.toml"));
    assert!(result.is_err());
}

#[test]
fn test_example_config_matches_defaults() {
    let config = Config::parse_toml(dockcube::EXAMPLE_CONFIG).unwrap();
    assert_eq!(config.workers, Config::default().workers);
    assert_eq!(config.limits, Config::default().limits);
    assert!(config.docker_host.is_none());
    assert!(config.images.is_empty());
}
