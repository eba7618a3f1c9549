//! Tests for error types

use higgsml::Error;

#[test]
fn test_config_error() {
    let error = Error::Config("Variable 'x' already declared".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Configuration error"));
    assert!(error_str.contains("already declared"));
}

#[test]
fn test_storage_error() {
    let error = Error::Storage("Collection 'signal_events' not found".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("signal_events"));
}

#[test]
fn test_training_error_names_the_method() {
    let error = Error::Training {
        method: "BDT".to_string(),
        reason: "first tree classifies no better than chance".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Training error"));
    assert!(error_str.contains("BDT"));
    assert!(error_str.contains("no better than chance"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_arrow_error_conversion() {
    let arrow_error = arrow::error::ArrowError::ParseError("bad cell".to_string());
    let error: Error = arrow_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("Arrow error"));
    assert!(error_str.contains("bad cell"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let error: Error = json_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("Report serialization error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Config("bad".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Config"));
}

#[test]
fn test_result_type_alias() {
    // Test that Result<T> can be used
    #[allow(clippy::unnecessary_wraps)]
    fn returns_result() -> higgsml::Result<i32> {
        Ok(42)
    }

    let result = returns_result();
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_result_type_alias_error() {
    fn returns_error() -> higgsml::Result<i32> {
        Err(Error::Storage("test error".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
}
