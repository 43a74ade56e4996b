use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::*;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.store.path, "pollpack_db");
    assert_eq!(settings.store.namespace, "pollpack");
    assert_eq!(settings.session.batch_size, 5);
    assert_eq!(settings.session.retry_interval_secs, 5);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_partial_settings_fill_missing_fields() {
    let partial = PartialSettings {
        session: Some(super::settings::PartialSessionSettings {
            batch_size: Some(10),
            retry_interval_secs: None,
        }),
        ..Default::default()
    };

    let merged = partial.merge_with_defaults();
    assert_eq!(merged.session.batch_size, 10);
    assert_eq!(merged.session.retry_interval_secs, 5);
    assert_eq!(merged.store, StoreSettings::default());
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let stem = tmp.path().join("absent");
    let settings = load_config_from(stem.to_str().unwrap()).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("pollpack.toml");
    fs::write(
        &file,
        r#"
            [store]
            path = "/var/lib/pollpack"

            [session]
            batch_size = 8
            retry_interval_secs = 2

            [log]
            level = "debug"
        "#,
    )
    .unwrap();

    let stem = tmp.path().join("pollpack");
    let cfg = load_config_from(stem.to_str().unwrap()).unwrap();
    assert_eq!(cfg.store.path, "/var/lib/pollpack");
    assert_eq!(cfg.store.namespace, "pollpack");
    assert_eq!(cfg.session.batch_size, 8);
    assert_eq!(cfg.session.retry_interval_secs, 2);
    assert_eq!(cfg.log.level, "debug");
}

#[test]
#[serial]
fn test_environment_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let stem = tmp.path().join("absent");

    temp_env::with_vars(
        [
            ("POLLPACK_SESSION__BATCH_SIZE", Some("12")),
            ("POLLPACK_STORE__NAMESPACE", Some("edge")),
        ],
        || {
            let cfg = load_config_from(stem.to_str().unwrap()).unwrap();
            assert_eq!(cfg.session.batch_size, 12);
            assert_eq!(cfg.store.namespace, "edge");
            assert_eq!(cfg.session.retry_interval_secs, 5);
        },
    );
}
