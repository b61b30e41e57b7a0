//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin. `None` allows any origin.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Authentication (JWT) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    /// Token lifetime, either plain seconds or with an s/m/h/d suffix
    /// (for example `3600`, `12h`, `1d`).
    #[serde(default = "default_jwt_expires_in")]
    pub jwt_expires_in: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_jwt_expires_in() -> String {
    "1d".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `ENQUETE_ENV`)
    /// 3. Environment variables with `ENQUETE_` prefix
    /// 4. The canonical deployment variables `DATABASE_URL`, `JWT_SECRET`,
    ///    `JWT_EXPIRES_IN`, `PORT` and `CORS_ORIGIN`, which override
    ///    everything else.
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("ENQUETE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ENQUETE")
                    .separator("__")
                    .try_parsing(true),
            )
            // Nothing in the files is mandatory; the canonical env vars below
            // can supply the required values on their own.
            .set_default("database.url", "")?
            .set_default("auth.jwt_secret", "")?
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ENQUETE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), config::ConfigError> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(expires) = std::env::var("JWT_EXPIRES_IN") {
            self.auth.jwt_expires_in = expires;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| config::ConfigError::Message(format!("invalid PORT: {port}")))?;
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            self.server.cors_origin = Some(origin);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.database.url.is_empty() {
            return Err(config::ConfigError::Message(
                "database.url is required (set DATABASE_URL)".to_string(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret is required (set JWT_SECRET)".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 3000);
        assert_eq!(default_jwt_expires_in(), "1d");
    }

    #[test]
    fn test_validate_requires_url_and_secret() {
        let mut config = Config {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                cors_origin: None,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                min_connections: 2,
            },
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
                jwt_expires_in: "1d".to_string(),
            },
        };
        assert!(config.validate().is_err());

        config.database.url = "postgres://localhost/enquete".to_string();
        assert!(config.validate().is_ok());

        config.auth.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }
}
