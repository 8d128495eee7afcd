//! Runtime settings for the condo-api server.
//!
//! Sources are layered lowest to highest: built-in defaults,
//! `config/default.toml`, `config/{RUN_ENV}.toml`, then `APP__*` variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const FALLBACK_RUN_ENV: &str = "development";
const FALLBACK_LOG_LEVEL: &str = "info";
const FALLBACK_PORT: u16 = 8080;
const FALLBACK_DATABASE_URL: &str = "sqlite://condo.db?mode=rwc";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Shipped in `config/default.toml` for local runs. Refused everywhere else.
const DEV_DEFAULT_JWT_SECRET: &str =
    "condo_api_development_secret_key_that_is_long_enough_for_local_runs_only_9f3Kq";

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    /// HMAC key for access tokens
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// `development`, `staging` or `production`
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending schema migrations at startup even in production
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma separated origins of the management console
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
    #[serde(default)]
    pub cors_allow_any_origin: bool,
    #[serde(default)]
    pub cors_allow_credentials: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Buffer size of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Builds a config from the required values, everything else at its default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn environment_is(&self, name: &str) -> bool {
        self.environment.trim().eq_ignore_ascii_case(name)
    }

    pub fn is_production(&self) -> bool {
        self.environment_is("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment_is("development")
    }

    /// Configured console origins, trimmed, blanks dropped.
    pub fn cors_origins(&self) -> impl Iterator<Item = &str> + '_ {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
    }

    /// Any origin may call the API when no explicit list is given.
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.cors_allow_any_origin || self.is_development()
    }

    /// Checks that depend on the deployment environment rather than a single field.
    fn check_deployment(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.cors_origins().next().is_none() && !self.should_allow_permissive_cors() {
            errors.add(
                "cors_allowed_origins",
                problem(
                    "cors_origins_missing",
                    "Outside development list the console origins in APP__CORS_ALLOWED_ORIGINS, or set APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                problem(
                    "jwt_secret_is_dev_default",
                    "The bundled development secret cannot sign tokens outside development; set APP__JWT_SECRET",
                ),
            );
        }

        if self.db_min_connections > self.db_max_connections {
            errors.add(
                "db_min_connections",
                problem("db_pool_bounds", "db_min_connections is larger than db_max_connections"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn problem(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn default_log_level() -> String {
    FALLBACK_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    FALLBACK_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_auth_issuer() -> String {
    "condo-api".to_string()
}

fn default_auth_audience() -> String {
    "condo-console".to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(problem("log_level", "expected trace, debug, info, warn or error"))
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    match weak_secret_reason(secret.trim()) {
        Some(reason) => Err(problem("jwt_secret", reason)),
        None => Ok(()),
    }
}

fn weak_secret_reason(secret: &str) -> Option<&'static str> {
    if secret.len() < 64 {
        return Some("JWT secret must be at least 64 characters");
    }
    let distinct: HashSet<char> = secret.chars().collect();
    if distinct.len() == 1 {
        return Some("JWT secret cannot repeat a single character");
    }
    let lowered = secret.to_ascii_lowercase();
    if ["changeme", "password", "12345", "abcdef", "secret123"]
        .iter()
        .any(|fragment| lowered.contains(fragment))
    {
        return Some("JWT secret contains a well-known weak fragment");
    }
    if distinct.len() < 10 {
        return Some("JWT secret needs at least 10 distinct characters");
    }
    None
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("condo_api={level},tower_http=debug,sea_orm=warn"));

    let builder = fmt().with_env_filter(EnvFilter::new(directives));
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| FALLBACK_RUN_ENV.to_string());
    info!(environment = %run_env, dir = %config_dir.display(), "loading configuration");

    let layered = Config::builder()
        .set_default("database_url", FALLBACK_DATABASE_URL)?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(FALLBACK_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", FALLBACK_LOG_LEVEL)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if layered.get_string("jwt_secret").is_err() {
        error!("no JWT secret configured; set APP__JWT_SECRET");
        return Err(ConfigError::NotFound("jwt_secret".into()).into());
    }

    let settings: AppConfig = layered.try_deserialize()?;
    if let Err(errors) = settings.validate().and_then(|_| settings.check_deployment()) {
        error!(?errors, "configuration rejected");
        return Err(errors.into());
    }

    info!(environment = %settings.environment, port = settings.port, "configuration loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_SECRET: &str =
        "t3st-Secret-for-condo-api-unit-tests-9081726354-qwertyuiopASDFGHJKL-zxcvbnm";

    fn production() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            TEST_SECRET.into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn production_needs_console_origins() {
        let mut cfg = production();
        assert!(cfg.check_deployment().is_err());

        cfg.cors_allowed_origins = Some(" https://bql.example.vn , ,".into());
        assert_eq!(cfg.cors_origins().collect::<Vec<_>>(), ["https://bql.example.vn"]);
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn explicit_opt_in_allows_any_origin() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn bundled_secret_only_works_in_development() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        let errors = cfg.check_deployment().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));

        cfg.environment = "Development".into();
        assert!(cfg.check_deployment().is_ok());
    }

    #[test]
    fn pool_bounds_must_be_ordered() {
        let mut cfg = production();
        cfg.cors_allow_any_origin = true;
        cfg.db_min_connections = 20;
        let errors = cfg.check_deployment().unwrap_err();
        assert!(errors.field_errors().contains_key("db_min_connections"));
    }

    #[test]
    fn weak_secrets_are_named() {
        assert!(weak_secret_reason(&"a".repeat(80)).is_some());
        assert!(weak_secret_reason(&format!("{}password", TEST_SECRET)).is_some());
        assert!(weak_secret_reason(&"ab".repeat(40)).is_some());
        assert!(weak_secret_reason(TEST_SECRET).is_none());

        let mut cfg = production();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reads_toml_from_config_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            format!("jwt_secret = \"{TEST_SECRET}\"\nport = 9090\nlog_level = \"debug\"\n"),
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.database_url(), FALLBACK_DATABASE_URL);
    }

    #[test]
    fn missing_secret_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("default.toml"), "port = 9091\n").unwrap();
        if env::var("APP__JWT_SECRET").is_err() {
            assert!(matches!(
                load_config_from(dir.path()),
                Err(AppConfigError::Load(_))
            ));
        }
    }
}
