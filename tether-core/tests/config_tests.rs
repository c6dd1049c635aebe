//! Project config error-message, atomic-write-safety, and discovery tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use std::fs;
use std::path::PathBuf;

use tether_core::{
    config::{self, ProjectConfig, RemoteConfig, TypeConfig},
    ConfigError,
};

fn sample() -> ProjectConfig {
    let mut cfg = ProjectConfig {
        solution_id: Some("sol-42".into()),
        remote: RemoteConfig {
            url: Some("https://api.example.com/solution/sol-42".into()),
            page_size: 25,
        },
        ..Default::default()
    };
    cfg.types.insert(
        "modules".into(),
        TypeConfig {
            location: Some(PathBuf::from("lib")),
            include: None,
            exclude: Some(vec!["**/*_spec.lua".into()]),
        },
    );
    cfg
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("tether.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("tether.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("tether.yaml"));
}

#[test]
fn load_wrong_shape_returns_parse_error() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("tether.yaml")
        .write_str("- this is a list, not a mapping\n")
        .expect("write");
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn empty_file_loads_defaults_but_fails_validation() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("tether.yaml").write_str("").expect("write");
    let cfg = config::load_at(root.path()).expect("load");
    assert_eq!(cfg, ProjectConfig::default());
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("solution_id"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_writes_file_and_cleans_tmp() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(root.path(), &sample()).expect("save");

    root.child("tether.yaml").assert(predicate::path::exists());
    root.child("tether.yaml").assert(predicate::str::contains("sol-42"));
    root.child("tether.yaml.tmp").assert(predicate::path::missing());
}

#[test]
fn leftover_tmp_does_not_affect_load() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(root.path(), &sample()).expect("save");
    let original = fs::read(config::config_path_at(root.path())).expect("read");

    // Simulate a crash between write and rename.
    root.child("tether.yaml.tmp")
        .write_str("CRASH - INCOMPLETE WRITE")
        .expect("write tmp");

    assert_eq!(fs::read(config::config_path_at(root.path())).unwrap(), original);
    assert_eq!(config::load_at(root.path()).expect("load"), sample());
}

// ---------------------------------------------------------------------------
// 3. Discovery
// ---------------------------------------------------------------------------

#[test]
fn find_project_root_from_nested_directory() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(root.path(), &sample()).expect("save");
    let nested = root.child("modules/util");
    nested.create_dir_all().expect("mkdir");

    let found = config::find_project_root(nested.path()).expect("find");
    assert_eq!(found, root.path());
}

#[test]
fn find_project_root_without_config_errors() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let err = config::find_project_root(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn type_overrides_survive_roundtrip() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(root.path(), &sample()).expect("save");
    let loaded = config::load_at(root.path()).expect("load");
    let modules = loaded.type_config("modules").expect("modules override");
    assert_eq!(modules.location.as_deref(), Some(std::path::Path::new("lib")));
    assert!(modules.include.is_none());
    assert!(loaded.type_config("files").is_none());
}
