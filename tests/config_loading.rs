use std::io::Write;
use std::time::Duration;

use weave_core::config::AppConfig;
use weave_core::error::WeaveError;
use weave_test_utils::write_config;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
event_buffer = 32
executor_timeout_ms = 1500
max_concurrency = 8
summary_chars = 60

[log]
filter = "weave=debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.event_buffer, 32);
    assert_eq!(config.engine.timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(config.engine.max_concurrency, Some(8));
    assert_eq!(config.engine.summary_chars, 60);
    assert_eq!(config.log.filter, "weave=debug");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("WEAVE_TEST_LOG_FILTER", "weave=trace");

    let tmp = write_config(
        r#"
[log]
filter = "${WEAVE_TEST_LOG_FILTER}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.log.filter, "weave=trace");

    std::env::remove_var("WEAVE_TEST_LOG_FILTER");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let tmp = write_config("");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.event_buffer, 256);
    assert_eq!(config.engine.summary_chars, 120);
    assert!(config.engine.executor_timeout_ms.is_none());
    assert!(config.engine.max_concurrency.is_none());
    assert_eq!(config.log.filter, "weave=info,warn");
}

#[test]
fn test_invalid_values_rejected() {
    let tmp = write_config(
        r#"
[engine]
event_buffer = 0
"#,
    );

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, WeaveError::Config(ref msg) if msg.contains("event_buffer")));
}

#[test]
fn test_malformed_toml_rejected() {
    let tmp = write_config("[engine\nevent_buffer = ");
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(WeaveError::Config(_))
    ));
}

#[test]
fn test_missing_file() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/weave.toml")).unwrap_err();
    assert!(matches!(err, WeaveError::ConfigNotFound(_)));
}
