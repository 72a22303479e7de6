//! Unit tests for error display and conversions.

use std::path::PathBuf;

use shogistack_connector::AppError;

#[test]
fn display_includes_category() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Engine("gone".into()).to_string(), "engine: gone");
    assert_eq!(AppError::Link("refused".into()).to_string(), "link: refused");
    assert_eq!(AppError::Io("denied".into()).to_string(), "io: denied");
}

#[test]
fn engine_not_found_names_the_path() {
    let err = AppError::EngineNotFound(PathBuf::from("/opt/engine/YaneuraOu"));

    assert_eq!(err.to_string(), "engine not found: /opt/engine/YaneuraOu");
}

#[test]
fn io_errors_convert() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();

    assert!(matches!(err, AppError::Io(ref msg) if msg == "pipe closed"));
}

#[test]
fn toml_errors_are_config_errors() {
    let err: AppError = toml::from_str::<toml::Table>("= broken").unwrap_err().into();

    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("invalid config")));
}
