use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnvValue { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub timeout: Duration,
}

/// Material for the at-rest certificate key. Never logged.
#[derive(Clone)]
pub struct VaultSettings {
    pub secret: String,
    pub salt: String,
    pub sweep_interval: Duration,
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("secret", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppSettings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gateway: GatewaySettings,
    pub vault: VaultSettings,
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSettings")
            .field("database_url", &self.redacted_database_url())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("gateway", &self.gateway)
            .field("vault", &self.vault)
            .finish()
    }
}

impl AppSettings {
    /// The database URL with its password masked. Unparseable URLs are hidden entirely.
    pub fn redacted_database_url(&self) -> String {
        match url::Url::parse(&self.database_url) {
            Ok(mut parsed) => {
                if parsed.password().is_some() && parsed.set_password(Some("redacted")).is_err() {
                    return "<redacted>".to_string();
                }
                parsed.to_string()
            }
            Err(_) => "<redacted>".to_string(),
        }
    }

    /// Reads settings from the process environment. `.env` must already be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = required(&lookup, "CERTIFICATE_SECRET")?;
        if secret.chars().count() < 16 {
            return Err(invalid("CERTIFICATE_SECRET", "must be at least 16 characters"));
        }
        let salt = required(&lookup, "CERTIFICATE_KEY_SALT")?;
        if salt.len() < 8 {
            return Err(invalid("CERTIFICATE_KEY_SALT", "must be at least 8 bytes"));
        }

        let base_url = required(&lookup, "FISCAL_GATEWAY_URL")?;
        url::Url::parse(&base_url).map_err(|e| invalid("FISCAL_GATEWAY_URL", &e.to_string()))?;

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            host: lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(&lookup, "APP_PORT", 8080)?,
            gateway: GatewaySettings {
                base_url,
                timeout: Duration::from_secs(positive(&lookup, "FISCAL_GATEWAY_TIMEOUT_SECS", 30)?),
            },
            vault: VaultSettings {
                secret,
                salt,
                sweep_interval: Duration::from_secs(positive(
                    &lookup,
                    "CERTIFICATE_SWEEP_INTERVAL_SECS",
                    3600,
                )?),
            },
        })
    }
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnvValue {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

fn required<F>(lookup: &F, var: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
}

fn parsed<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| invalid(var, &e.to_string())),
        None => Ok(default),
    }
}

fn positive<F>(lookup: &F, var: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parsed(lookup, var, default)?;
    if value == 0 {
        return Err(invalid(var, "must be greater than zero"));
    }
    Ok(value)
}
