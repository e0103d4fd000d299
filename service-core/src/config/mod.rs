use crate::error::AppError;
use serde::Deserialize;
use std::env;

/// Settings common to every service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                AppError::ConfigError(anyhow::anyhow!("invalid PORT: {}", e))
            })?;

        Ok(Self {
            port,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
        })
    }
}

/// Read an environment variable, falling back to `default` when one is
/// given. In production every variable must be set explicitly.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
