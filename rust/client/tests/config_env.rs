use std::io::Write;

use parlor_client::config::{self, ValueSource, BASE_URL_ENV, CONFIG_ENV, FRAME_ENV, HOLD_ENV};
use parlor_client::{ClientConfig, ConfigError};
use serial_test::serial;
use tempfile::NamedTempFile;

fn clear_env() {
    for name in [
        CONFIG_ENV,
        BASE_URL_ENV,
        FRAME_ENV,
        HOLD_ENV,
        config::TIMEOUT_ENV,
        config::HISTORY_LIMIT_ENV,
    ] {
        std::env::remove_var(name);
    }
}

#[test]
#[serial]
fn defaults_when_nothing_is_set() {
    clear_env();
    let resolved = config::load_with_sources().expect("load");
    assert_eq!(resolved.config, ClientConfig::default());
    assert_eq!(resolved.sources.base_url, ValueSource::Default);
    assert_eq!(resolved.sources.history_limit, ValueSource::Default);
}

#[test]
#[serial]
fn file_then_env_layering() {
    clear_env();
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "base_url = \"http://10.0.0.2:5000\"\nframe_interval_ms = 33\nlimbo_hold_ms = 4000"
    )
    .expect("write config");

    std::env::set_var(CONFIG_ENV, file.path());
    std::env::set_var(FRAME_ENV, "20");
    let resolved = config::load_with_sources().expect("load");
    clear_env();

    assert_eq!(resolved.config.base_url, "http://10.0.0.2:5000");
    assert_eq!(resolved.sources.base_url, ValueSource::File);
    assert_eq!(resolved.config.frame_interval_ms, 20);
    assert_eq!(resolved.sources.frame_interval_ms, ValueSource::Env);
    assert_eq!(resolved.config.limbo_hold_ms, 4000);
    assert_eq!(resolved.sources.limbo_hold_ms, ValueSource::File);
    assert_eq!(resolved.config.settle_hold_ms, 2000);
    assert_eq!(resolved.sources.settle_hold_ms, ValueSource::Default);
}

#[test]
#[serial]
fn bad_env_number_is_rejected() {
    clear_env();
    std::env::set_var(HOLD_ENV, "soon");
    let result = config::load_with_sources();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains(HOLD_ENV)));
}

#[test]
#[serial]
fn non_http_base_url_from_env_fails_validation() {
    clear_env();
    std::env::set_var(BASE_URL_ENV, "ws://127.0.0.1:5000");
    let result = config::load();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn broken_toml_is_a_parse_error() {
    clear_env();
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "base_url = ").expect("write config");
    std::env::set_var(CONFIG_ENV, file.path());
    let result = config::load();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
#[serial]
fn missing_file_is_an_io_error() {
    clear_env();
    std::env::set_var(CONFIG_ENV, "/nonexistent/parlor.toml");
    let result = config::load();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
