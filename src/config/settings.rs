//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (user profile cache)
    pub redis: RedisSettings,

    /// JWT verification settings
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket configuration
    pub websocket: WebSocketSettings,

    /// Messaging behaviour switches
    pub chat: ChatSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// How long a cached user profile stays valid, in seconds
    pub profile_ttl_secs: u64,

    /// Optional namespace for cache keys
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// JWT verification configuration.
///
/// Tokens are issued by the account service; this server only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared HS256 secret
    pub secret: String,

    /// Expected `iss` claim, if any
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    pub audience: Option<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 45000)
    pub heartbeat_interval_ms: u64,
}

/// Messaging behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Push REST-submitted messages and read receipts to live connections too
    pub rest_push_fanout: bool,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.profile_ttl_secs", 300)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)?
            .set_default("chat.rest_push_fanout", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    /// Reject configurations that would run insecurely.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_secret(secret: &str) -> Settings {
        Settings {
            server: ServerSettings {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/dm".into(),
                max_connections: 5,
                min_connections: 1,
                acquire_timeout: 5,
                run_migrations: false,
            },
            redis: RedisSettings {
                url: "redis://localhost:6379".into(),
                profile_ttl_secs: 60,
                key_prefix: None,
            },
            jwt: JwtSettings {
                secret: secret.into(),
                issuer: None,
                audience: None,
            },
            cors: CorsSettings {
                allowed_origins: vec![],
            },
            websocket: WebSocketSettings {
                max_message_size: 65536,
                max_frame_size: 16384,
                heartbeat_interval_ms: 45000,
            },
            chat: ChatSettings {
                rest_push_fanout: false,
            },
            environment: "test".into(),
        }
    }

    #[test]
    fn test_short_jwt_secret_is_rejected() {
        assert!(settings_with_secret("short").validate().is_err());
    }

    #[test]
    fn test_valid_settings_pass() {
        let settings = settings_with_secret(&"k".repeat(MIN_JWT_SECRET_LENGTH))
            .validate()
            .unwrap();
        assert_eq!(settings.server_addr(), "127.0.0.1:8080");
    }
}
