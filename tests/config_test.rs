/*!
 * Configuration Loader Tests
 *
 * Validation of raw environment maps into a typed Config: defaults,
 * per-field violations, and the collected diagnostics for bad input.
 */

mod common;

use std::ffi::OsString;

use common::*;
use gatehouse::config::{Config, LogFormat, RuntimeMode, render_violations};
use gatehouse::constants::DEFAULT_LOG_FILTER;
use gatehouse::server::listen_banner;

fn vars_with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
    let mut vars = valid_vars();
    for (key, value) in extra {
        vars.retain(|(k, _)| k != key);
        vars.push((*key, *value));
    }
    vars
}

#[test]
fn minimal_environment_uses_defaults() {
    let config = Config::from_vars(valid_vars()).expect("valid environment rejected");

    assert_eq!(config.port, 5000);
    assert_eq!(config.node_env, RuntimeMode::Development);
    assert_eq!(config.mongo_uri, "mongodb://x");
    assert_eq!(config.jwt_secret, TEST_SECRET);
    assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    assert_eq!(config.log_format, LogFormat::Pretty);
}

#[test]
fn end_to_end_defaults_reach_listen_banner() {
    let secret = "a".repeat(32);
    let config = Config::from_vars([
        ("MONGO_URI", "mongodb://x".to_string()),
        ("JWT_SECRET", secret),
    ])
    .expect("valid environment rejected");

    assert_eq!(config.port, 5000);
    assert_eq!(config.node_env.to_string(), "development");
    assert_eq!(config.bind_address().port(), 5000);
    assert!(listen_banner(config.port).contains("5000"));
}

#[test]
fn explicit_values_are_parsed() {
    let config = Config::from_vars(vars_with(&[
        ("PORT", "8080"),
        ("NODE_ENV", "production"),
        ("LOG_FORMAT", "json"),
        ("RUST_LOG", "debug"),
    ]))
    .expect("valid environment rejected");

    assert_eq!(config.port, 8080);
    assert_eq!(config.node_env, RuntimeMode::Production);
    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.log_filter, "debug");
}

#[test]
fn leading_zero_port_is_accepted() {
    let config = Config::from_vars(vars_with(&[("PORT", "0080")])).unwrap();
    assert_eq!(config.port, 80);
}

#[test]
fn missing_mongo_uri_is_rejected() {
    let err = Config::from_vars([("JWT_SECRET", TEST_SECRET)]).unwrap_err();

    assert_eq!(err.violations.len(), 1);
    assert_eq!(err.violations[0].field, "MONGO_URI");
}

#[test]
fn empty_mongo_uri_is_rejected() {
    let err = Config::from_vars(vars_with(&[("MONGO_URI", "")])).unwrap_err();

    assert!(err.has_field("MONGO_URI"));
    assert_eq!(err.violations[0].message, "MONGO_URI is required");
}

#[test]
fn whitespace_mongo_uri_is_left_to_the_driver() {
    let config = Config::from_vars(vars_with(&[("MONGO_URI", "  ")])).unwrap();
    assert_eq!(config.mongo_uri, "  ");
}

#[cfg(unix)]
#[test]
fn non_unicode_values_are_reported_per_variable() {
    use std::os::unix::ffi::OsStringExt;

    let raw = |bytes: &[u8]| OsString::from_vec(bytes.to_vec());
    let err = Config::from_os_vars([
        (OsString::from("NODE_ENV"), raw(b"t\xffst")),
        (OsString::from("PORT"), raw(b"80\xff")),
        (OsString::from("MONGO_URI"), raw(b"mongodb://\xfe")),
        (OsString::from("JWT_SECRET"), OsString::from(TEST_SECRET)),
        (OsString::from("UNRELATED"), raw(b"\xff")),
    ])
    .unwrap_err();

    let fields: Vec<&str> = err.violations.iter().map(|v| v.field).collect();
    assert_eq!(fields, vec!["PORT", "MONGO_URI", "NODE_ENV"]);
    assert!(err.violations.iter().all(|v| v.message.contains("valid Unicode")));
}

#[test]
fn os_vars_that_decode_are_validated_normally() {
    let config = Config::from_os_vars(
        valid_vars()
            .into_iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v))),
    )
    .unwrap();
    assert_eq!(config.port, 5000);
}

#[test]
fn short_secret_is_rejected() {
    let err = Config::from_vars(vars_with(&[("JWT_SECRET", "too-short")])).unwrap_err();

    assert!(err.has_field("JWT_SECRET"));
    assert!(err.violations[0].message.contains("at least 32 characters"));
}

#[test]
fn secret_length_counts_characters() {
    // 32 multi-byte characters
    let secret = "é".repeat(32);
    let config = Config::from_vars([
        ("MONGO_URI", "mongodb://x".to_string()),
        ("JWT_SECRET", secret.clone()),
    ])
    .expect("32-character secret rejected");
    assert_eq!(config.jwt_secret, secret);

    let err = Config::from_vars([
        ("MONGO_URI", "mongodb://x".to_string()),
        ("JWT_SECRET", "é".repeat(31)),
    ])
    .unwrap_err();
    assert!(err.has_field("JWT_SECRET"));
}

#[test]
fn non_numeric_port_is_rejected() {
    for port in ["abc", "80a", "-1", "", " 80", "3.5"] {
        let mut vars = valid_vars();
        vars.push(("PORT", port));
        let err = Config::from_vars(vars).unwrap_err();
        assert!(err.has_field("PORT"), "port {:?} should be rejected", port);
    }
}

#[test]
fn out_of_range_port_is_rejected() {
    for port in ["0", "65536", "99999999999"] {
        let mut vars = valid_vars();
        vars.push(("PORT", port));
        let err = Config::from_vars(vars).unwrap_err();
        assert!(err.has_field("PORT"), "port {:?} should be rejected", port);
    }
}

#[test]
fn unknown_runtime_mode_is_rejected() {
    let err = Config::from_vars(vars_with(&[("NODE_ENV", "staging")])).unwrap_err();

    assert!(err.has_field("NODE_ENV"));
    assert!(err.violations[0].message.contains("'staging'"));
}

#[test]
fn invalid_log_settings_are_rejected() {
    let err = Config::from_vars(vars_with(&[("LOG_FORMAT", "xml"), ("RUST_LOG", "gatehouse=loud")]))
        .unwrap_err();

    assert!(err.has_field("LOG_FORMAT"));
    assert!(err.has_field("RUST_LOG"));
}

#[test]
fn every_violation_is_reported_in_field_order() {
    let err = Config::from_vars([
        ("PORT", "http"),
        ("JWT_SECRET", "short"),
        ("NODE_ENV", "qa"),
    ])
    .unwrap_err();

    let fields: Vec<&str> = err.violations.iter().map(|v| v.field).collect();
    assert_eq!(fields, vec!["PORT", "MONGO_URI", "JWT_SECRET", "NODE_ENV"]);
}

#[test]
fn diagnostics_list_each_field_and_the_hint() {
    let err = Config::from_vars([("PORT", "x")]).unwrap_err();
    let report = render_violations(&err);

    assert!(report.starts_with("Invalid environment configuration:"));
    assert!(report.contains("  - PORT: "));
    assert!(report.contains("  - MONGO_URI: Required"));
    assert!(report.contains("  - JWT_SECRET: Required"));
    assert!(report.ends_with("Please check your .env file and fix the above errors."));
}

#[test]
fn debug_output_hides_the_secret() {
    let config = Config::from_vars(valid_vars()).unwrap();
    let debug = format!("{:?}", config);

    assert!(!debug.contains(TEST_SECRET));
    assert!(debug.contains("[redacted]"));
}

#[test]
fn runtime_mode_round_trips_through_strings() {
    for mode in ["development", "production", "test"] {
        let parsed: RuntimeMode = mode.parse().unwrap();
        assert_eq!(parsed.to_string(), mode);
    }
    assert!("Production".parse::<RuntimeMode>().is_err());
}
