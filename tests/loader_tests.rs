//! Integration tests for config loading and `$extends`

use dollar_config::{load_config, Config, DollarError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_loads_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo.yaml", "abc: 1");

    assert_eq!(load_config(dir.path().join("foo.yaml")).unwrap(), json!({"abc": 1}));
}

#[test]
fn test_loads_json_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo.json", r#"{"abc": {"$param": "x"}}"#);

    assert_eq!(
        load_config(dir.path().join("foo.json")).unwrap(),
        json!({"abc": {"$param": "x"}})
    );
}

#[test]
fn test_loads_config_with_a_parent() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo.yaml", "$extends: bar.yaml\nabc: 1");
    write(dir.path(), "bar.yaml", "abc: 2\ndef: 3");

    assert_eq!(
        load_config(dir.path().join("foo.yaml")).unwrap(),
        json!({"abc": 1, "def": 3})
    );
}

#[test]
fn test_loads_config_with_multiple_parents() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo.yaml", "$extends: [baz.yaml, bar.yaml]\nabc: 1");
    write(dir.path(), "bar.yaml", "abc: 2\ndef: 3");
    write(dir.path(), "baz.yaml", "abc: 4\ndef: 5\nghi: 6");

    assert_eq!(
        load_config(dir.path().join("foo.yaml")).unwrap(),
        json!({"abc": 1, "def": 3, "ghi": 6})
    );
}

#[test]
fn test_loads_config_with_grandparents() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "foo.yaml", "$extends: nested/bar.yaml\nabc: 1");
    // Parent paths are relative to the file that names them
    write(dir.path(), "nested/bar.yaml", "$extends: ../baz.yaml\nabc: 2\ndef: 3");
    write(dir.path(), "baz.yaml", "abc: 4\ndef: 5\nghi: 6");

    assert_eq!(
        load_config(dir.path().join("foo.yaml")).unwrap(),
        json!({"abc": 1, "def": 3, "ghi": 6})
    );
}

#[test]
fn test_nested_mappings_are_merged() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "base.yaml", "server:\n  host: localhost\n  port: 80\ntags: [a, b]");
    write(dir.path(), "prod.yaml", "$extends: base.yaml\nserver:\n  port: 443\ntags: [c]");

    assert_eq!(
        load_config(dir.path().join("prod.yaml")).unwrap(),
        json!({"server": {"host": "localhost", "port": 443}, "tags": ["c"]})
    );
}

#[test]
fn test_shared_grandparent_is_not_a_cycle() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "root.yaml", "a: 0");
    write(dir.path(), "left.yaml", "$extends: root.yaml\nb: 1");
    write(dir.path(), "right.yaml", "$extends: root.yaml\nc: 2");
    write(dir.path(), "child.yaml", "$extends: [left.yaml, right.yaml]");

    assert_eq!(
        load_config(dir.path().join("child.yaml")).unwrap(),
        json!({"a": 0, "b": 1, "c": 2})
    );
}

#[test]
fn test_extends_cycle_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.yaml", "$extends: b.yaml\nx: 1");
    write(dir.path(), "b.yaml", "$extends: a.yaml\ny: 2");

    assert!(matches!(
        load_config(dir.path().join("a.yaml")),
        Err(DollarError::ExtendsCycle { .. })
    ));
}

#[test]
fn test_invalid_extends_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.yaml", "$extends: 5");

    assert!(matches!(
        load_config(dir.path().join("a.yaml")),
        Err(DollarError::InvalidExtends { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_config(dir.path().join("nope.yaml")),
        Err(DollarError::Io(_))
    ));
}

#[test]
fn test_config_from_file_resolves_merged_tree() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "base.yaml", "port:\n  $param: [port, 80]");
    write(dir.path(), "app.yaml", "$extends: base.yaml\nname: app");

    let config = Config::from_file(dir.path().join("app.yaml")).unwrap();
    assert_eq!(
        config.build(&json!({"port": 8080})),
        Some(json!({"port": 8080, "name": "app"}))
    );
}
