use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

use crate::models::model::{AppConfig, DatabaseConfig, SafeApiConfig, ServerConfig};
use crate::sync::orchestrator::{DEFAULT_TRANSFER_LIMIT, DEFAULT_WRITE_DELAY, TRANSFER_LIMITS};

impl AppConfig {
    pub fn from_file(path: PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| anyhow!("Invalid PORT: {}", e))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL must be set"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|e| anyhow!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))?,
            },
            safe_api: SafeApiConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Invalid server port"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("Invalid database pool size"));
        }

        self.safe_api.validate()
    }
}

impl SafeApiConfig {
    pub fn from_env() -> Result<Self> {
        Ok(SafeApiConfig {
            bearer_token: env::var("SAFE_API_BEARER_TOKEN").ok(),
            write_delay_ms: env::var("SYNC_WRITE_DELAY_MS")
                .unwrap_or_else(|_| DEFAULT_WRITE_DELAY.as_millis().to_string())
                .parse()
                .map_err(|e| anyhow!("Invalid SYNC_WRITE_DELAY_MS: {}", e))?,
            transfer_limit: env::var("SYNC_TRANSFER_LIMIT")
                .unwrap_or_else(|_| DEFAULT_TRANSFER_LIMIT.to_string())
                .parse()
                .map_err(|e| anyhow!("Invalid SYNC_TRANSFER_LIMIT: {}", e))?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !TRANSFER_LIMITS.contains(&self.transfer_limit) {
            return Err(anyhow!(
                "SYNC_TRANSFER_LIMIT must be one of {:?}",
                TRANSFER_LIMITS
            ));
        }

        if let Some(token) = &self.bearer_token {
            if token.trim().is_empty() {
                return Err(anyhow!("SAFE_API_BEARER_TOKEN must not be blank"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for key in [
            "HOST",
            "PORT",
            "DATABASE_URL",
            "DATABASE_MAX_CONNECTIONS",
            "SAFE_API_BEARER_TOKEN",
            "SYNC_WRITE_DELAY_MS",
            "SYNC_TRANSFER_LIMIT",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn from_env_requires_a_database_url() {
        clear_env();
        assert!(AppConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn from_env_applies_defaults() {
        clear_env();
        unsafe { env::set_var("DATABASE_URL", "postgres://localhost/safenotes") };

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.safe_api.write_delay_ms, 100);
        assert_eq!(config.safe_api.transfer_limit, DEFAULT_TRANSFER_LIMIT);
        assert!(config.safe_api.bearer_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn validate_rejects_unsupported_transfer_limits() {
        clear_env();
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/safenotes");
            env::set_var("SYNC_TRANSFER_LIMIT", "37");
        }

        let config = AppConfig::from_env().unwrap();
        assert!(config.validate().is_err());
    }
}
