use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_COLUMN_WIDTH: usize = 20;
const MIN_COLUMN_WIDTH: usize = 8;

/// Loads `.env` from the working directory, falling back to the crate directory.
pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt: JwtConfig,
    pub query_log: QueryLogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = match std::env::var("APP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| AppError::configuration("APP_PORT must be a valid port"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            jwt: JwtConfig::from_env()?,
            query_log: QueryLogConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogConfig {
    pub enabled: bool,
    pub column_width: usize,
    /// Names redacted in addition to the built-in sensitive fields.
    pub extra_sensitive_fields: Vec<String>,
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            column_width: DEFAULT_COLUMN_WIDTH,
            extra_sensitive_fields: Vec::new(),
        }
    }
}

impl QueryLogConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(value) = lookup("QUERY_LOG_ENABLED") {
            config.enabled = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(AppError::configuration("QUERY_LOG_ENABLED must be a boolean")),
            };
        }

        if let Some(value) = lookup("QUERY_LOG_COLUMN_WIDTH") {
            let width = value
                .trim()
                .parse::<usize>()
                .map_err(|_| AppError::configuration("QUERY_LOG_COLUMN_WIDTH must be a valid integer"))?;
            if width < MIN_COLUMN_WIDTH {
                return Err(AppError::configuration(format!(
                    "QUERY_LOG_COLUMN_WIDTH must be at least {MIN_COLUMN_WIDTH}"
                )));
            }
            config.column_width = width;
        }

        if let Some(value) = lookup("SENSITIVE_FIELDS") {
            config.extra_sensitive_fields = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}
