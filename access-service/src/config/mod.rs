use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;

use crate::models::{DEFAULT_GRANT_TTL_HOURS, MAX_GRANT_TTL_HOURS};
use crate::services::{TokenTransport, DEFAULT_COOKIE_NAME};

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub grant: GrantConfig,
    pub delivery: DeliveryConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct GrantConfig {
    pub expire_after_hours: i64,
    pub transport: TokenTransport,
}

impl GrantConfig {
    /// Grant lifetime, held to `1..=MAX_GRANT_TTL_HOURS` hours.
    pub fn expire_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expire_after_hours.clamp(1, MAX_GRANT_TTL_HOURS))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryMode {
    Smtp,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub mode: DeliveryMode,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub relay: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("relay", &self.relay)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("allowed_origins", &self.allowed_origins)
            .field("admin_api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub signup_attempts: u32,
    pub signup_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let backend = match get("STORE_BACKEND", Some("memory"))?.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Invalid STORE_BACKEND: {}",
                    other
                )))
            }
        };

        let transport = match get("TOKEN_TRANSPORT", Some("header"))?.to_lowercase().as_str() {
            "header" => TokenTransport::Header,
            "cookie" => TokenTransport::cookie(get("TOKEN_COOKIE_NAME", Some(DEFAULT_COOKIE_NAME))?),
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Invalid TOKEN_TRANSPORT: {}",
                    other
                )))
            }
        };

        let mode = match get("DELIVERY_MODE", Some("disabled"))?.to_lowercase().as_str() {
            "smtp" => DeliveryMode::Smtp,
            "disabled" => DeliveryMode::Disabled,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Invalid DELIVERY_MODE: {}",
                    other
                )))
            }
        };

        let smtp = match mode {
            DeliveryMode::Smtp => Some(SmtpConfig {
                relay: get_env(&lookup, "SMTP_RELAY", None, true)?,
                user: get_env(&lookup, "SMTP_USER", None, true)?,
                password: get_env(&lookup, "SMTP_PASSWORD", None, true)?,
                from: get_env(&lookup, "SMTP_FROM", None, true)?,
            }),
            DeliveryMode::Disabled => None,
        };

        let database_url = match backend {
            StoreBackend::Postgres => Some(get_env(&lookup, "DATABASE_URL", None, true)?),
            StoreBackend::Memory => lookup("DATABASE_URL"),
        };

        let config = AccessConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("access-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            store: StoreConfig {
                backend,
                database_url,
                max_connections: parse(
                    "DATABASE_MAX_CONNECTIONS",
                    get("DATABASE_MAX_CONNECTIONS", Some("10"))?,
                )?,
            },
            grant: GrantConfig {
                expire_after_hours: parse(
                    "GRANT_EXPIRE_AFTER_HOURS",
                    get(
                        "GRANT_EXPIRE_AFTER_HOURS",
                        Some(&DEFAULT_GRANT_TTL_HOURS.to_string()),
                    )?,
                )?,
                transport,
            },
            delivery: DeliveryConfig { mode, smtp },
            security: SecurityConfig {
                allowed_origins: get("ALLOWED_ORIGINS", Some("http://localhost:3000"))?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                admin_api_key: get_env(&lookup, "ADMIN_API_KEY", None, true)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse(
                    "RATE_LIMIT_LOGIN_ATTEMPTS",
                    get("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"))?,
                )?,
                login_window_seconds: parse(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    get("RATE_LIMIT_LOGIN_WINDOW_SECONDS", Some("900"))?,
                )?,
                signup_attempts: parse(
                    "RATE_LIMIT_SIGNUP_ATTEMPTS",
                    get("RATE_LIMIT_SIGNUP_ATTEMPTS", Some("3"))?,
                )?,
                signup_window_seconds: parse(
                    "RATE_LIMIT_SIGNUP_WINDOW_SECONDS",
                    get("RATE_LIMIT_SIGNUP_WINDOW_SECONDS", Some("3600"))?,
                )?,
                global_ip_limit: parse(
                    "RATE_LIMIT_GLOBAL_IP_LIMIT",
                    get("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"))?,
                )?,
                global_ip_window_seconds: parse(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    get("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", Some("60"))?,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !(1..=MAX_GRANT_TTL_HOURS).contains(&self.grant.expire_after_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GRANT_EXPIRE_AFTER_HOURS must be between 1 and {}",
                MAX_GRANT_TTL_HOURS
            )));
        }

        if self.store.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be positive"
            )));
        }

        if self.security.admin_api_key.len() < 16 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ADMIN_API_KEY must be at least 16 characters"
            )));
        }

        if let TokenTransport::Cookie { name } = &self.grant.transport {
            if name.is_empty() || name.contains([';', '=', ' ']) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "TOKEN_COOKIE_NAME is not a valid cookie name"
                )));
            }
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.store.backend == StoreBackend::Memory {
                tracing::warn!("In-memory store in production; state is lost on restart");
            }
        }

        Ok(())
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse<T>(key: &str, value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
