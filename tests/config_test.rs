//! Configuration loading and validation through the public API

use craftcheck::config::{AnalysisConfig, CONFIG_FILE_NAME};
use craftcheck::{ConfigError, Engine, EngineError, SourceFile};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &path,
        r#"
workers = 2
perFileTimeoutMs = 2500

[rules.too_many_arguments.thresholds]
maxParams = 5

[rules.MagicLiteral]
enabled = false
"#,
    )
    .unwrap();

    let config = AnalysisConfig::load(&path).unwrap();
    let engine = Engine::with_builtins(&config).unwrap();
    let resolved = engine.config();
    assert_eq!(resolved.workers, 2);
    assert_eq!(resolved.per_file_timeout_ms, 2500);
    assert_eq!(resolved.threshold("TooManyArguments", "maxParams"), Some(5.0));
    assert!(!resolved.is_enabled("MagicLiteral"));
    assert!(resolved.is_enabled("DuplicateCode"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = AnalysisConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_unknown_rule_fails_before_analysis() {
    let config = AnalysisConfig::from_toml_str("[rules.NoSuchRule]\nenabled = true\n").unwrap();
    let err = Engine::with_builtins(&config).err().expect("unknown rule must fail");
    assert!(matches!(err, ConfigError::UnknownRule(ref id) if id == "NoSuchRule"));
    assert_eq!(err.key().as_deref(), Some("rules.NoSuchRule"));
}

#[test]
fn test_invalid_threshold_names_its_key() {
    let config = AnalysisConfig::default().with_threshold("TooManyArguments", "maxParams", -1.0);
    let err = Engine::with_builtins(&config).err().expect("negative count must fail");
    assert!(matches!(err, ConfigError::InvalidThreshold { .. }));
    assert_eq!(
        err.key().as_deref(),
        Some("rules.TooManyArguments.thresholds.maxParams")
    );
}

#[test]
fn test_unknown_threshold_is_rejected() {
    let config = AnalysisConfig::default().with_threshold("TooManyArguments", "maxWidth", 3.0);
    let err = Engine::with_builtins(&config).err().expect("unknown key must fail");
    assert!(matches!(err, ConfigError::UnknownThreshold { .. }));
}

#[test]
fn test_two_spellings_of_one_rule_conflict() {
    let config = AnalysisConfig::default()
        .with_rule_enabled("TooManyArguments", true)
        .with_rule_enabled("too-many-arguments", false);
    let err = Engine::with_builtins(&config).err().expect("conflict must fail");
    assert!(matches!(err, ConfigError::Conflict { .. }));
}

#[test]
fn test_malformed_document_is_parse_error() {
    let err = AnalysisConfig::from_toml_str("workers = [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_cancellation_before_run() {
    let engine = Engine::with_builtins(&AnalysisConfig::default()).unwrap();
    let token = engine.cancellation_token();
    token.cancel();
    let result = engine.analyze(&[SourceFile::new("a.ir.json", "{}")]);
    assert!(matches!(result, Err(EngineError::Cancelled)));
}
