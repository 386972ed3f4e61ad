//! Environment validation.
//!
//! The raw environment is read exactly once, by [`load`]. Everything else
//! receives the validated [`Config`].

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
    Test,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Production => "production",
            RuntimeMode::Test => "test",
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(RuntimeMode::Development),
            "production" => Ok(RuntimeMode::Production),
            "test" => Ok(RuntimeMode::Test),
            other => Err(format!(
                "Invalid enum value. Expected 'development' | 'production' | 'test', received '{}'",
                other
            )),
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "Invalid enum value. Expected 'pretty' | 'json', received '{}'",
                other
            )),
        }
    }
}

/// Validated process configuration. Built once at startup, never mutated.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub mongo_uri: String,
    pub jwt_secret: String,
    pub node_env: RuntimeMode,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("mongo_uri", &self.mongo_uri)
            .field("jwt_secret", &"[redacted]")
            .field("node_env", &self.node_env)
            .field("log_filter", &self.log_filter)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// A single failed check: which variable, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
#[error("invalid environment configuration: {} violation(s)", .violations.len())]
pub struct ConfigError {
    pub violations: Vec<Violation>,
}

impl ConfigError {
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl Config {
    /// Validates a name -> value mapping. Every violation is collected before
    /// failing, so callers see the complete list in one pass.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::validate(&vars, Vec::new())
    }

    /// Validates raw OS strings, as read from the process environment.
    /// A known variable whose value is not Unicode is a violation on that
    /// variable; unknown ones are ignored.
    pub fn from_os_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let (vars, violations) = decode_os_vars(vars);
        Self::validate(&vars, violations)
    }

    /// Snapshots the process environment and merges `.env` underneath it.
    /// Variables already set in the environment win over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let (mut vars, mut violations) = decode_os_vars(env::vars_os());

        if let Ok(entries) = dotenvy::dotenv_iter() {
            for entry in entries {
                match entry {
                    Ok((key, value)) => {
                        if !violations.iter().any(|v| v.field == key) {
                            vars.entry(key).or_insert(value);
                        }
                    }
                    Err(e) => {
                        violations.push(Violation::new(DOTENV_FIELD, e.to_string()));
                        break;
                    }
                }
            }
        }

        Self::validate(&vars, violations)
    }

    fn validate(
        vars: &HashMap<String, String>,
        mut violations: Vec<Violation>,
    ) -> Result<Self, ConfigError> {
        let port = match vars.get(PORT_VAR) {
            None => Some(DEFAULT_PORT),
            Some(raw) => match parse_port(raw) {
                Ok(port) => Some(port),
                Err(msg) => {
                    violations.push(Violation::new(PORT_VAR, msg));
                    None
                }
            },
        };

        let mongo_uri = match vars.get(MONGO_URI_VAR) {
            None => {
                require(&mut violations, MONGO_URI_VAR);
                None
            }
            Some(uri) if uri.is_empty() => {
                violations.push(Violation::new(MONGO_URI_VAR, "MONGO_URI is required"));
                None
            }
            Some(uri) => Some(uri.clone()),
        };

        let jwt_secret = match vars.get(JWT_SECRET_VAR) {
            None => {
                require(&mut violations, JWT_SECRET_VAR);
                None
            }
            Some(secret) if secret.chars().count() < MIN_JWT_SECRET_LENGTH => {
                violations.push(Violation::new(
                    JWT_SECRET_VAR,
                    format!(
                        "JWT_SECRET must be at least {} characters for security",
                        MIN_JWT_SECRET_LENGTH
                    ),
                ));
                None
            }
            Some(secret) => Some(secret.clone()),
        };

        let node_env = parse_optional(vars, NODE_ENV_VAR, &mut violations);

        let log_filter = match vars.get(RUST_LOG_VAR) {
            None => Some(DEFAULT_LOG_FILTER.to_string()),
            Some(filter) => match EnvFilter::try_new(filter) {
                Ok(_) => Some(filter.clone()),
                Err(e) => {
                    violations.push(Violation::new(RUST_LOG_VAR, e.to_string()));
                    None
                }
            },
        };

        let log_format = parse_optional(vars, LOG_FORMAT_VAR, &mut violations);
        violations.sort_by_key(|v| FIELD_ORDER.iter().position(|field| *field == v.field));

        match (port, mongo_uri, jwt_secret, node_env, log_filter, log_format) {
            (
                Some(port),
                Some(mongo_uri),
                Some(jwt_secret),
                Some(node_env),
                Some(log_filter),
                Some(log_format),
            ) if violations.is_empty() => Ok(Config {
                port,
                mongo_uri,
                jwt_secret,
                node_env,
                log_filter,
                log_format,
            }),
            _ => Err(ConfigError { violations }),
        }
    }

    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from((DEFAULT_HOST, self.port))
    }
}

/// Validated variables in the order their violations are reported.
const FIELD_ORDER: [&str; 7] = [
    DOTENV_FIELD,
    PORT_VAR,
    MONGO_URI_VAR,
    JWT_SECRET_VAR,
    NODE_ENV_VAR,
    RUST_LOG_VAR,
    LOG_FORMAT_VAR,
];

fn decode_os_vars<I>(vars: I) -> (HashMap<String, String>, Vec<Violation>)
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut decoded = HashMap::new();
    let mut violations = Vec::new();
    for (key, value) in vars {
        let Ok(key) = key.into_string() else {
            continue;
        };
        match value.into_string() {
            Ok(value) => {
                decoded.insert(key, value);
            }
            Err(raw) => {
                if let Some(field) = FIELD_ORDER[1..].iter().find(|field| **field == key) {
                    violations.push(Violation::new(
                        *field,
                        format!("must be valid Unicode, received '{}'", raw.to_string_lossy()),
                    ));
                }
            }
        }
    }
    (decoded, violations)
}

/// Absence is only reported when the variable has no other violation, such
/// as an undecodable value.
fn require(violations: &mut Vec<Violation>, field: &'static str) {
    if !violations.iter().any(|v| v.field == field) {
        violations.push(Violation::new(field, "Required"));
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("must contain only digits, received '{}'", raw));
    }
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(format!("must be a port number between 1 and 65535, received '{}'", raw)),
    }
}

fn parse_optional<T>(
    vars: &HashMap<String, String>,
    field: &'static str,
    violations: &mut Vec<Violation>,
) -> Option<T>
where
    T: FromStr<Err = String> + Default,
{
    match vars.get(field) {
        None => Some(T::default()),
        Some(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(msg) => {
                violations.push(Violation::new(field, msg));
                None
            }
        },
    }
}

/// Renders the diagnostic block printed before a failed startup exits.
pub fn render_violations(err: &ConfigError) -> String {
    let mut out = String::from("Invalid environment configuration:\n");
    for violation in &err.violations {
        out.push_str(&format!("  - {}\n", violation));
    }
    out.push_str("\nPlease check your .env file and fix the above errors.");
    out
}

/// Loads and validates the environment, exiting with status 1 on failure.
///
/// Runs before the tracing subscriber exists, so diagnostics go to stderr.
pub fn load() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", render_violations(&err));
            std::process::exit(1);
        }
    }
}
