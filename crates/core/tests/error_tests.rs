//! Tests for error types

use docpub_core::Error;
use std::path::Path;

#[test]
fn test_configuration_error() {
    let error = Error::configuration("trigger.paths must not be empty");
    assert_eq!(
        error.to_string(),
        "Configuration error: trigger.paths must not be empty"
    );
}

#[test]
fn test_stage_errors_name_their_stage() {
    assert_eq!(
        Error::fetch("remote unreachable").to_string(),
        "Checkout failed: remote unreachable"
    );
    assert_eq!(
        Error::toolchain("poetry", "not on PATH").to_string(),
        "Toolchain provisioning failed for poetry: not on PATH"
    );
    assert_eq!(
        Error::dependencies("registry unreachable").to_string(),
        "Dependency installation failed: registry unreachable"
    );
    assert_eq!(
        Error::deploy("push rejected").to_string(),
        "Publishing failed: push rejected"
    );
}

#[test]
fn test_io_error_with_path() {
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let error = Error::io(io_error, Path::new("/tmp/docpub.toml"), "read");
    let msg = error.to_string();
    assert!(msg.contains("I/O read failed"));
    assert!(msg.contains("/tmp/docpub.toml"));
    assert!(msg.contains("file not found"));
}

#[test]
fn test_io_error_conversion() {
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
    let error = Error::from(io_error);
    assert!(matches!(error, Error::Io { path: None, .. }));
}

#[test]
fn test_diagnostic_codes() {
    use miette::Diagnostic;

    let code = Error::deploy("x").code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("docpub::deploy"));

    let help = Error::fetch("x").help().map(|h| h.to_string());
    assert!(help.is_some_and(|h| h.contains("GITHUB_TOKEN")));
}

#[test]
fn test_result_type_alias() {
    use docpub_core::Result;

    fn returns_ok() -> Result<String> {
        Ok("success".to_string())
    }

    fn returns_err() -> Result<String> {
        Err(Error::configuration("failure"))
    }

    assert!(returns_ok().is_ok());
    assert!(returns_err().is_err());
}
