//! Integration tests for the SettingsStore:
//! - Recursive diffing (nested structs)
//! - Persisting only changed (delta) fields
//! - Reloading after external file modification
//! - Validation on register, reload and update
//! - Failed writes leave the in-memory values untouched

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use settings::{Settings, SettingsError, SettingsStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct Nested {
    enabled: bool,
    level: u8,
}

impl Default for Nested {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct Endpoint {
    url: String,
    port: u16,
    nested: Nested,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            url: "http://localhost".into(),
            port: 100,
            nested: Nested::default(),
        }
    }
}

impl Settings for Endpoint {
    const SECTION: &'static str = "endpoint";

    fn validate(&self) -> Result<(), SettingsError> {
        if self.port == 0 {
            return Err(SettingsError::InvalidValue {
                section: Self::SECTION,
                field: "port",
                reason: "must not be 0".into(),
            });
        }
        Ok(())
    }
}

fn settings_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("config").join("app.settings.toml")
}

#[test]
fn register_get_update_delta_flat_and_nested() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);

    let store = SettingsStore::builder()
        .with_settings_file(path.clone())
        .build()
        .expect("build store");
    store.register::<Endpoint>().expect("register endpoint");

    assert!(
        !path.exists(),
        "Expected no file before first update, found: {path:?}"
    );

    let initial = store.get::<Endpoint>().expect("get initial");
    assert_eq!(*initial, Endpoint::default());

    store
        .update::<Endpoint, _>(|e| e.nested.enabled = true)
        .expect("update nested.enabled");

    let content = fs::read_to_string(&path).expect("read delta file");
    let root: toml::Table = toml::from_str(&content).expect("parse delta");
    let section = root
        .get("endpoint")
        .and_then(|v| v.as_table())
        .expect("endpoint section");

    assert!(!section.contains_key("port"), "port unchanged => not in delta");
    assert!(!section.contains_key("url"), "url unchanged => not in delta");
    let nested = section
        .get("nested")
        .and_then(|v| v.as_table())
        .expect("nested delta");
    assert_eq!(nested.get("enabled").and_then(|v| v.as_bool()), Some(true));
    assert!(!nested.contains_key("level"));

    store
        .update::<Endpoint, _>(|e| {
            e.port = 7777;
            e.nested.level = 5;
        })
        .expect("update port + nested.level");

    let reopened = SettingsStore::builder()
        .with_settings_file(path)
        .build()
        .expect("reopen");
    reopened.register::<Endpoint>().expect("register again");
    let effective = reopened.get::<Endpoint>().expect("get after reopen");
    assert_eq!(effective.port, 7777);
    assert_eq!(effective.nested.level, 5);
    assert!(effective.nested.enabled);
    assert_eq!(effective.url, "http://localhost");
}

#[test]
fn update_back_to_default_removes_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);
    let store = SettingsStore::builder()
        .with_settings_file(path.clone())
        .build()
        .expect("build");
    store.register::<Endpoint>().expect("register");

    store.update::<Endpoint, _>(|e| e.port = 1).expect("diverge");
    store.update::<Endpoint, _>(|e| e.port = 100).expect("revert");

    let content = fs::read_to_string(&path).expect("read");
    let root: toml::Table = toml::from_str(&content).expect("parse");
    assert!(root.is_empty());
}

#[test]
fn reload_applies_external_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);

    let store = SettingsStore::builder()
        .with_settings_file(path.clone())
        .build()
        .expect("build");
    store.register::<Endpoint>().expect("register");
    store
        .update::<Endpoint, _>(|e| e.port = 1500)
        .expect("initial update");

    let external = r#"
[endpoint]
port = 9000

[endpoint.nested]
enabled = true
"#;
    fs::write(&path, external).expect("write external delta");

    store.reload().expect("reload after external change");

    let endpoint = store.get::<Endpoint>().expect("get after reload");
    assert_eq!(endpoint.port, 9000);
    assert!(endpoint.nested.enabled);
    assert_eq!(
        endpoint.nested.level, 1,
        "unchanged nested.level should remain default"
    );
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, "[endpoint]\nport = 0\n").expect("write");

    let store = SettingsStore::builder()
        .with_settings_file(path)
        .build()
        .expect("build");

    let err = store.register::<Endpoint>().expect_err("port 0 is invalid");
    assert!(matches!(err, SettingsError::InvalidValue { field: "port", .. }));
    assert!(matches!(
        store.get::<Endpoint>(),
        Err(SettingsError::NotRegistered)
    ));
}

#[test]
fn double_registration_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SettingsStore::builder()
        .with_settings_file(settings_path(&dir))
        .build()
        .expect("build");

    store.register::<Endpoint>().expect("first");
    assert!(store.is_registered::<Endpoint>());
    assert!(store.register::<Endpoint>().is_err());
}

#[test]
fn reload_rejects_invalid_file_and_keeps_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);
    let store = SettingsStore::builder()
        .with_settings_file(path.clone())
        .build()
        .expect("build");
    store.register::<Endpoint>().expect("register");
    store.update::<Endpoint, _>(|e| e.port = 1500).expect("update");

    fs::write(&path, "[endpoint]\nport = 0\n").expect("write invalid delta");

    let err = store.reload().expect_err("port 0 is invalid");
    assert!(matches!(err, SettingsError::InvalidValue { field: "port", .. }));
    assert_eq!(store.get::<Endpoint>().expect("get").port, 1500);
}

#[test]
fn failed_write_does_not_change_memory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = settings_path(&dir);
    let store = SettingsStore::builder()
        .with_settings_file(path.clone())
        .build()
        .expect("build");
    store.register::<Endpoint>().expect("register");
    store.update::<Endpoint, _>(|e| e.port = 1500).expect("update");

    fs::remove_dir_all(path.parent().expect("parent")).expect("remove config dir");

    store
        .update::<Endpoint, _>(|e| e.port = 2500)
        .expect_err("settings directory is gone");
    assert_eq!(store.get::<Endpoint>().expect("get").port, 1500);

    fs::create_dir_all(path.parent().expect("parent")).expect("recreate config dir");
    store
        .update::<Endpoint, _>(|e| e.nested.level = 3)
        .expect("update after recovery");
    let content = fs::read_to_string(&path).expect("read delta");
    let root: toml::Table = toml::from_str(&content).expect("parse");
    let section = root
        .get("endpoint")
        .and_then(|v| v.as_table())
        .expect("endpoint section");
    assert_eq!(section.get("port").and_then(|v| v.as_integer()), Some(1500));
}
